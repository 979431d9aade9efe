// crates/bundle-vault-server/src/lib.rs
// ============================================================================
// Module: Bundle Vault Server Library
// Description: HTTP service for the Bundle Vault record store.
// Purpose: Expose upload, listing, and download routes with bearer auth.
// Dependencies: axum, bundle-vault-core, bundle-vault-config
// ============================================================================

//! ## Overview
//! The server wraps the core [`bundle_vault_core::RecordLedger`] and
//! [`bundle_vault_core::SelectionEngine`] in an axum router. Every data route
//! passes through [`RequestAuthz`] before touching the store, and every
//! request outcome is written to a [`VaultAuditSink`] as a JSON line.
//! Security posture: request bodies and headers are untrusted input.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod auth;
pub mod server;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use audit::VaultAuditEvent;
pub use audit::VaultAuditEventParams;
pub use audit::VaultAuditSink;
pub use auth::AuthAuditSink;
pub use auth::BearerTokenAuthz;
pub use auth::RequestAuthz;
pub use auth::RequestContext;
pub use server::ApiError;
pub use server::VaultServer;
pub use server::VaultServerError;
