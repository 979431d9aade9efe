// crates/bundle-vault-core/src/interfaces/mod.rs
// ============================================================================
// Module: Bundle Vault Interfaces
// Description: Backend-agnostic record store contract.
// Purpose: Define the persistence surface used by the ledger and selection
//          engine.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! A [`RecordStore`] appends rows and answers [`Selector`] lookups. Stores
//! own every record exclusively; callers never mutate or delete rows.
//!
//! ## Invariants
//! - `append` is atomic: the full row is visible with its id and timestamp,
//!   or nothing is.
//! - `select` returns matches newest first (creation time, then id).
//! - Creation time is assigned by the store and is monotonic with row id.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::InsertReceipt;
use crate::core::NewRecord;
use crate::core::Record;
use crate::core::RecordKind;
use crate::core::Selector;

// ============================================================================
// SECTION: Record Store
// ============================================================================

/// Record store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("record store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("record store corruption: {0}")]
    Corrupt(String),
    /// Store schema version is incompatible.
    #[error("record store version mismatch: {0}")]
    VersionMismatch(String),
    /// Store data is invalid.
    #[error("record store invalid data: {0}")]
    Invalid(String),
    /// Store reported an error.
    #[error("record store error: {0}")]
    Store(String),
}

/// Append-only persistence for bundle records.
pub trait RecordStore {
    /// Appends a row and returns its assigned identity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the row cannot be persisted.
    fn append(&self, record: NewRecord) -> Result<InsertReceipt, StoreError>;

    /// Returns rows matching `selector`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn select(&self, selector: &Selector) -> Result<Vec<Record>, StoreError>;

    /// Returns the number of stored rows of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the count fails.
    fn count(&self, kind: RecordKind) -> Result<u64, StoreError>;
}
