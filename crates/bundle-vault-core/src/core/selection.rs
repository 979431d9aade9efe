// crates/bundle-vault-core/src/core/selection.rs
// ============================================================================
// Module: Bundle Vault Selectors
// Description: Key filters and newest-wins ordering shared by all backends.
// Purpose: Express record lookups once, independent of record kind and store.
// Dependencies: crate::core::{identifiers, records}
// ============================================================================

//! ## Overview
//! A [`Selector`] names a record kind, a conjunction of exact-match key
//! predicates, an optional row limit, and whether blobs are needed. Optional
//! filters are added with [`Selector::optional`], which appends nothing when
//! the value is absent or empty: an omitted run tag means "any run tag", not
//! "rows without a run tag".
//!
//! ## Invariants
//! - Matches are ordered by creation time descending, then row id
//!   descending, so "newest" is deterministic under coarse clocks.
//! - A predicate on a field the record kind does not carry never matches.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;

use crate::core::records::Record;
use crate::core::records::RecordKind;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default number of best-run pointers returned by history listings.
pub const DEFAULT_LIST_LIMIT: u32 = 10;
/// Smallest accepted history listing limit.
pub const MIN_LIST_LIMIT: u32 = 1;
/// Largest accepted history listing limit.
pub const MAX_LIST_LIMIT: u32 = 100;

/// SQL ordering clause implementing newest-wins ordering.
pub const NEWEST_FIRST_SQL: &str = "ORDER BY created_at DESC, id DESC";

// ============================================================================
// SECTION: Key Fields
// ============================================================================

/// Key columns that selectors may constrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyField {
    /// Lineage key of calibrations and results.
    HashId,
    /// Result name.
    Name,
    /// Run label of results and best-run pointers.
    RunTag,
    /// Lineage key named by a best-run pointer.
    CalibrationHashId,
}

impl KeyField {
    /// Returns the storage column name for this field.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::HashId => "hash_id",
            Self::Name => "name",
            Self::RunTag => "run_tag",
            Self::CalibrationHashId => "calibration_hash_id",
        }
    }

    /// Returns true when records of `kind` carry this field.
    #[must_use]
    pub const fn applies_to(self, kind: RecordKind) -> bool {
        match (self, kind) {
            (Self::HashId, RecordKind::Calibration | RecordKind::Result)
            | (Self::Name, RecordKind::Result)
            | (Self::RunTag, RecordKind::Result | RecordKind::BestRun)
            | (Self::CalibrationHashId, RecordKind::BestRun) => true,
            _ => false,
        }
    }
}

/// Exact-match predicate on a key field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    /// Constrained field.
    pub field: KeyField,
    /// Required value.
    pub value: String,
}

impl Predicate {
    /// Returns true when `record` satisfies the predicate.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        field_value(record, self.field) == Some(self.value.as_str())
    }
}

// ============================================================================
// SECTION: Selector
// ============================================================================

/// Lookup over one record kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    /// Record kind to read.
    kind: RecordKind,
    /// Conjunction of exact-match predicates.
    predicates: Vec<Predicate>,
    /// Maximum number of rows to return.
    limit: Option<u32>,
    /// Whether blobs must be loaded.
    include_blob: bool,
}

impl Selector {
    /// Starts an unconstrained, metadata-only selector for `kind`.
    #[must_use]
    pub const fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            predicates: Vec::new(),
            limit: None,
            include_blob: false,
        }
    }

    /// Adds a required exact-match predicate. Surrounding whitespace is
    /// dropped, matching how keys are stored.
    #[must_use]
    pub fn require(mut self, field: KeyField, value: impl AsRef<str>) -> Self {
        self.predicates.push(Predicate {
            field,
            value: value.as_ref().trim().to_string(),
        });
        self
    }

    /// Adds a predicate only when `value` is present and non-empty.
    #[must_use]
    pub fn optional<V: AsRef<str>>(self, field: KeyField, value: Option<V>) -> Self {
        match value {
            Some(value) if !value.as_ref().trim().is_empty() => self.require(field, value),
            _ => self,
        }
    }

    /// Caps the number of returned rows.
    #[must_use]
    pub const fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Restricts the lookup to the single newest match.
    #[must_use]
    pub const fn newest(self) -> Self {
        self.limit(1)
    }

    /// Requests blobs alongside metadata.
    #[must_use]
    pub const fn with_blob(mut self) -> Self {
        self.include_blob = true;
        self
    }

    /// Returns the record kind.
    #[must_use]
    pub const fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Returns the predicates in insertion order.
    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Returns the row cap, if any.
    #[must_use]
    pub const fn row_limit(&self) -> Option<u32> {
        self.limit
    }

    /// Returns true when blobs are requested.
    #[must_use]
    pub const fn includes_blob(&self) -> bool {
        self.include_blob
    }

    /// Returns true when `record` has this selector's kind and satisfies
    /// every predicate.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        record.kind() == self.kind
            && self.predicates.iter().all(|predicate| predicate.matches(record))
    }
}

// ============================================================================
// SECTION: Ordering
// ============================================================================

/// Orders records newest first: creation time descending, then id descending.
#[must_use]
pub fn newest_first(left: &Record, right: &Record) -> Ordering {
    right
        .created_at()
        .cmp(&left.created_at())
        .then_with(|| right.id().cmp(&left.id()))
}

// ============================================================================
// SECTION: List Limit
// ============================================================================

/// Resolved history listing limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListLimit(u32);

impl ListLimit {
    /// Resolves a caller-supplied limit: missing yields the default, any
    /// integer is clamped into the accepted range.
    #[must_use]
    pub fn resolve(requested: Option<i64>) -> Self {
        let Some(requested) = requested else {
            return Self(DEFAULT_LIST_LIMIT);
        };
        let clamped = requested.clamp(i64::from(MIN_LIST_LIMIT), i64::from(MAX_LIST_LIMIT));
        Self(u32::try_from(clamped).unwrap_or(MAX_LIST_LIMIT))
    }

    /// Returns the resolved limit.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl Default for ListLimit {
    fn default() -> Self {
        Self(DEFAULT_LIST_LIMIT)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the value of `field` on `record`, or `None` when absent.
fn field_value(record: &Record, field: KeyField) -> Option<&str> {
    match (record, field) {
        (Record::Calibration(record), KeyField::HashId) => Some(record.meta.hash_id.as_str()),
        (Record::Result(record), KeyField::HashId) => Some(record.meta.hash_id.as_str()),
        (Record::Result(record), KeyField::Name) => Some(record.meta.name.as_str()),
        (Record::Result(record), KeyField::RunTag) => {
            record.meta.run_tag.as_ref().map(crate::core::identifiers::RunTag::as_str)
        }
        (Record::BestRun(pointer), KeyField::RunTag) => Some(pointer.run_tag.as_str()),
        (Record::BestRun(pointer), KeyField::CalibrationHashId) => {
            Some(pointer.calibration_hash_id.as_str())
        }
        _ => None,
    }
}
