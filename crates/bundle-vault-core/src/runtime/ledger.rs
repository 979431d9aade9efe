// crates/bundle-vault-core/src/runtime/ledger.rs
// ============================================================================
// Module: Bundle Vault Ledger
// Description: Validated inserts and metadata listings.
// Purpose: Guard the append-only tables so rejected writes leave no rows.
// Dependencies: crate::core, crate::interfaces, crate::runtime
// ============================================================================

//! ## Overview
//! The ledger validates every insert before touching the store, so a
//! rejected request never creates a row. Listings return metadata only;
//! blobs are never loaded for list responses.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;

use crate::core::BestRunPointer;
use crate::core::CalibrationMeta;
use crate::core::HashId;
use crate::core::InsertReceipt;
use crate::core::KeyField;
use crate::core::ListLimit;
use crate::core::NewBestRun;
use crate::core::NewCalibration;
use crate::core::NewRecord;
use crate::core::NewResult;
use crate::core::RecordId;
use crate::core::RecordKind;
use crate::core::ResultMeta;
use crate::core::RunTag;
use crate::core::Selector;
use crate::core::Timestamp;
use crate::interfaces::RecordStore;
use crate::runtime::SharedRecordStore;
use crate::runtime::VaultError;
use crate::runtime::collect_variant;
use crate::runtime::require_non_blank;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Identity assigned to an appended result, echoing its run tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultReceipt {
    /// Store-assigned row identifier.
    pub id: RecordId,
    /// Store-assigned creation time.
    pub created_at: Timestamp,
    /// Run tag stored with the row, if any.
    pub run_tag: Option<RunTag>,
}

/// Validated writer and lister over the record store.
#[derive(Clone)]
pub struct RecordLedger {
    /// Backing store.
    store: SharedRecordStore,
}

impl RecordLedger {
    /// Creates a ledger over `store`.
    #[must_use]
    pub const fn new(store: SharedRecordStore) -> Self {
        Self {
            store,
        }
    }

    /// Appends a calibration bundle.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Validation`] when the lineage key or blob is
    /// empty, and [`VaultError::Store`] when persistence fails.
    pub fn insert_calibration(&self, new: NewCalibration) -> Result<InsertReceipt, VaultError> {
        require_non_blank("hashID", new.hash_id.as_str())?;
        if new.blob.is_empty() {
            return Err(VaultError::Validation("archive file is required".to_string()));
        }
        let new = NewCalibration {
            hash_id: new.hash_id.trimmed(),
            notes: normalize_notes(new.notes),
            ..new
        };
        Ok(self.store.append(NewRecord::Calibration(new))?)
    }

    /// Appends a result bundle. An empty run tag is stored as absent.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Validation`] when the lineage key, name, or
    /// blob is empty, and [`VaultError::Store`] when persistence fails.
    pub fn insert_result(&self, new: NewResult) -> Result<ResultReceipt, VaultError> {
        require_non_blank("hashID", new.hash_id.as_str())?;
        require_non_blank("name", new.name.as_str())?;
        if new.blob.is_empty() {
            return Err(VaultError::Validation("archive file is required".to_string()));
        }
        let run_tag = new.run_tag.as_ref().filter(|tag| !tag.is_blank()).map(RunTag::trimmed);
        let new = NewResult {
            hash_id: new.hash_id.trimmed(),
            name: new.name.trimmed(),
            run_tag: run_tag.clone(),
            notes: normalize_notes(new.notes),
            ..new
        };
        let receipt = self.store.append(NewRecord::Result(new))?;
        Ok(ResultReceipt {
            id: receipt.id,
            created_at: receipt.created_at,
            run_tag,
        })
    }

    /// Appends a best-run pointer to the global log.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Validation`] when either key is empty, and
    /// [`VaultError::Store`] when persistence fails.
    pub fn insert_best_run_pointer(&self, new: NewBestRun) -> Result<InsertReceipt, VaultError> {
        require_non_blank("calibrationHashID", new.calibration_hash_id.as_str())?;
        require_non_blank("runID", new.run_tag.as_str())?;
        let new = NewBestRun {
            calibration_hash_id: new.calibration_hash_id.trimmed(),
            run_tag: new.run_tag.trimmed(),
        };
        Ok(self.store.append(NewRecord::BestRun(new))?)
    }

    /// Lists every calibration, newest first, without blobs.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Store`] when the lookup fails.
    pub fn list_calibrations(&self) -> Result<Vec<CalibrationMeta>, VaultError> {
        collect_variant(self.store.select(&Selector::new(RecordKind::Calibration))?)
    }

    /// Lists the results of one lineage, newest first, without blobs.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Validation`] when the lineage key is empty, and
    /// [`VaultError::Store`] when the lookup fails.
    pub fn list_results(&self, hash_id: &HashId) -> Result<Vec<ResultMeta>, VaultError> {
        require_non_blank("hashID", hash_id.as_str())?;
        let selector = Selector::new(RecordKind::Result).require(KeyField::HashId, hash_id);
        collect_variant(self.store.select(&selector)?)
    }

    /// Lists the best-run pointer history, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Store`] when the lookup fails.
    pub fn list_best_run_pointers(
        &self,
        limit: ListLimit,
    ) -> Result<Vec<BestRunPointer>, VaultError> {
        let selector = Selector::new(RecordKind::BestRun).limit(limit.get());
        collect_variant(self.store.select(&selector)?)
    }

    /// Returns the number of stored rows of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Store`] when the count fails.
    pub fn row_count(&self, kind: RecordKind) -> Result<u64, VaultError> {
        Ok(self.store.count(kind)?)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Drops blank notes so they are stored as absent.
fn normalize_notes(notes: Option<String>) -> Option<String> {
    notes.filter(|value| !value.trim().is_empty())
}
