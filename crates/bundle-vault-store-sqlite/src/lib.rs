// crates/bundle-vault-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Record Store
// Description: Durable RecordStore backend using SQLite WAL.
// Purpose: Provide production persistence for Bundle Vault records.
// Dependencies: bundle-vault-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`RecordStore`] implementation with
//! one append-only table per record kind. Every operation runs in its own
//! short-lived session, so no connection is shared across requests.
//!
//! [`RecordStore`]: bundle_vault_core::RecordStore

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteRecordStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
