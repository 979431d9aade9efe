// crates/bundle-vault-cli/src/lib.rs
// ============================================================================
// Module: Bundle Vault CLI Library
// Description: Shared helpers for the Bundle Vault command-line interface.
// Purpose: Provide the message catalog and HTTP client to the binary and tests.
// Dependencies: reqwest, bundle-vault-core, bundle-vault-config
// ============================================================================

//! ## Overview
//! This library houses the CLI message catalog and [`client::VaultClient`],
//! the HTTP client that packs files before upload and unpacks downloaded
//! bundles. The binary entry point (`src/main.rs`) routes every user-facing
//! string through [`t!`](crate::t).

// ============================================================================
// SECTION: Modules
// ============================================================================

/// HTTP client for the vault server.
pub mod client;
/// Message catalog and translation helpers.
pub mod i18n;
