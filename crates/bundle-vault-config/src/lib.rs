// crates/bundle-vault-config/src/lib.rs
// ============================================================================
// Module: Bundle Vault Config Library
// Description: Canonical config model, validation, and client profiles.
// Purpose: Single source of truth for bundle-vault.toml semantics.
// Dependencies: bundle-vault-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `bundle-vault-config` defines the server configuration model with strict,
//! fail-closed validation and environment overrides, plus the client profile
//! that remembers a server URL and token between CLI invocations.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod client;
pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use client::ClientProfile;
pub use config::*;
