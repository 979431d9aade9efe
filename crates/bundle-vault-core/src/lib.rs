// crates/bundle-vault-core/src/lib.rs
// ============================================================================
// Module: Bundle Vault Core Library
// Description: Public API surface for the Bundle Vault core.
// Purpose: Expose record types, the store interface, runtime services, and
//          the archive codec.
// Dependencies: crate::{archive, core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Bundle Vault core stores versioned ZIP bundles keyed by caller-supplied
//! identifiers and answers newest-wins lookups over them. It is
//! backend-agnostic: persistence plugs in through [`RecordStore`], and the
//! HTTP layer composes the [`RecordLedger`], [`SelectionEngine`], and
//! archive codec.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod archive;
pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use archive::ArchiveEntry;
pub use archive::ArchiveError;
pub use interfaces::RecordStore;
pub use interfaces::StoreError;
pub use runtime::InMemoryRecordStore;
pub use runtime::RecordLedger;
pub use runtime::ResultQuery;
pub use runtime::ResultReceipt;
pub use runtime::SelectionEngine;
pub use runtime::SharedRecordStore;
pub use runtime::VaultError;
