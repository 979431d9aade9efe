// crates/bundle-vault-core/src/runtime/engine.rs
// ============================================================================
// Module: Bundle Vault Selection Engine
// Description: Newest-wins lookups under required and optional key filters.
// Purpose: Resolve the single current row for calibrations, results, and
//          the best-run log.
// Dependencies: crate::core, crate::interfaces, crate::runtime
// ============================================================================

//! ## Overview
//! Every lookup builds a [`Selector`] capped at one row and lets the store
//! apply the shared newest-first ordering, so the tie-break rule lives in one
//! place for all record kinds.
//!
//! The best-run log is global: [`SelectionEngine::latest_best_run_pointer`]
//! returns the newest pointer regardless of which lineage it names.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::BestRunPointer;
use crate::core::CalibrationMeta;
use crate::core::CalibrationRecord;
use crate::core::HashId;
use crate::core::KeyField;
use crate::core::RecordKind;
use crate::core::ResultName;
use crate::core::ResultRecord;
use crate::core::RunTag;
use crate::core::Selector;
use crate::interfaces::RecordStore;
use crate::runtime::SharedRecordStore;
use crate::runtime::VaultError;
use crate::runtime::first_variant;
use crate::runtime::require_non_blank;

// ============================================================================
// SECTION: Queries
// ============================================================================

/// Keys for a result lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultQuery {
    /// Lineage key (required).
    pub hash_id: HashId,
    /// Result name (required).
    pub name: ResultName,
    /// Run tag filter; `None` or empty matches any run tag.
    pub run_tag: Option<RunTag>,
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Newest-wins lookups over the record store.
#[derive(Clone)]
pub struct SelectionEngine {
    /// Backing store.
    store: SharedRecordStore,
}

impl SelectionEngine {
    /// Creates a selection engine over `store`.
    #[must_use]
    pub const fn new(store: SharedRecordStore) -> Self {
        Self {
            store,
        }
    }

    /// Returns metadata of the newest calibration across all lineages.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Store`] when the lookup fails.
    pub fn latest_calibration(&self) -> Result<Option<CalibrationMeta>, VaultError> {
        first_variant(self.store.select(&Selector::new(RecordKind::Calibration).newest())?)
    }

    /// Returns the newest calibration of one lineage, including its blob.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Validation`] when the key is empty, and
    /// [`VaultError::Store`] when the lookup fails.
    pub fn latest_calibration_by_key(
        &self,
        hash_id: &HashId,
    ) -> Result<Option<CalibrationRecord>, VaultError> {
        require_non_blank("hashID", hash_id.as_str())?;
        let selector = Selector::new(RecordKind::Calibration)
            .require(KeyField::HashId, hash_id)
            .newest()
            .with_blob();
        first_variant(self.store.select(&selector)?)
    }

    /// Returns the newest result matching the query, including its blob.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Validation`] when the lineage key or name is
    /// empty, and [`VaultError::Store`] when the lookup fails.
    pub fn latest_result(&self, query: &ResultQuery) -> Result<Option<ResultRecord>, VaultError> {
        require_non_blank("hashID", query.hash_id.as_str())?;
        require_non_blank("name", query.name.as_str())?;
        let selector = Selector::new(RecordKind::Result)
            .require(KeyField::HashId, &query.hash_id)
            .require(KeyField::Name, &query.name)
            .optional(KeyField::RunTag, query.run_tag.as_ref())
            .newest()
            .with_blob();
        first_variant(self.store.select(&selector)?)
    }

    /// Returns the newest pointer in the global best-run log.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Store`] when the lookup fails.
    pub fn latest_best_run_pointer(&self) -> Result<Option<BestRunPointer>, VaultError> {
        first_variant(self.store.select(&Selector::new(RecordKind::BestRun).newest())?)
    }
}
