// crates/bundle-vault-core/src/runtime/mod.rs
// ============================================================================
// Module: Bundle Vault Runtime
// Description: Ledger and selection engine over a record store.
// Purpose: Implement validated inserts, listings, and newest-wins lookups.
// Dependencies: crate::core, crate::interfaces, thiserror
// ============================================================================

//! ## Overview
//! The runtime layers two services over a [`SharedRecordStore`]:
//! [`RecordLedger`] validates and appends rows and lists metadata, and
//! [`SelectionEngine`] resolves the single newest row for a set of keys.
//! Absence is reported as `Ok(None)`, never as an error.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod engine;
pub mod ledger;
pub mod store;

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::BestRunPointer;
use crate::core::CalibrationMeta;
use crate::core::CalibrationRecord;
use crate::core::Record;
use crate::core::ResultMeta;
use crate::core::ResultRecord;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use engine::ResultQuery;
pub use engine::SelectionEngine;
pub use ledger::RecordLedger;
pub use ledger::ResultReceipt;
pub use store::InMemoryRecordStore;
pub use store::SharedRecordStore;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Ledger and selection errors.
#[derive(Debug, Error)]
pub enum VaultError {
    /// A required field is missing or empty.
    #[error("{0}")]
    Validation(String),
    /// The backing store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Variant Extraction
// ============================================================================

/// Typed view over one [`Record`] variant.
trait RecordVariant: Sized {
    /// Extracts the variant, or `None` when `record` has another kind.
    fn from_record(record: Record) -> Option<Self>;
}

impl RecordVariant for CalibrationRecord {
    fn from_record(record: Record) -> Option<Self> {
        match record {
            Record::Calibration(record) => Some(record),
            _ => None,
        }
    }
}

impl RecordVariant for CalibrationMeta {
    fn from_record(record: Record) -> Option<Self> {
        CalibrationRecord::from_record(record).map(|record| record.meta)
    }
}

impl RecordVariant for ResultRecord {
    fn from_record(record: Record) -> Option<Self> {
        match record {
            Record::Result(record) => Some(record),
            _ => None,
        }
    }
}

impl RecordVariant for ResultMeta {
    fn from_record(record: Record) -> Option<Self> {
        ResultRecord::from_record(record).map(|record| record.meta)
    }
}

impl RecordVariant for BestRunPointer {
    fn from_record(record: Record) -> Option<Self> {
        match record {
            Record::BestRun(pointer) => Some(pointer),
            _ => None,
        }
    }
}

/// Converts store rows into one typed variant, failing closed on a kind
/// mismatch.
fn collect_variant<T: RecordVariant>(records: Vec<Record>) -> Result<Vec<T>, VaultError> {
    records
        .into_iter()
        .map(|record| {
            let kind = record.kind();
            T::from_record(record).ok_or_else(|| {
                VaultError::Store(StoreError::Corrupt(format!(
                    "store returned unexpected {} row",
                    kind.label()
                )))
            })
        })
        .collect()
}

/// Converts the first store row into one typed variant.
fn first_variant<T: RecordVariant>(records: Vec<Record>) -> Result<Option<T>, VaultError> {
    Ok(collect_variant(records)?.into_iter().next())
}

/// Rejects blank required fields with a descriptive message.
fn require_non_blank(field: &str, value: &str) -> Result<(), VaultError> {
    if value.trim().is_empty() {
        return Err(VaultError::Validation(format!("{field} is required")));
    }
    Ok(())
}
