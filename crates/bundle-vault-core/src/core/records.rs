// crates/bundle-vault-core/src/core/records.rs
// ============================================================================
// Module: Bundle Vault Records
// Description: The closed set of stored record kinds.
// Purpose: Share one structural model across calibrations, results, and
//          best-run pointers.
// Dependencies: crate::core::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! Three append-only record kinds share an id, a creation timestamp, and (for
//! bundles) an opaque blob; they differ only in key fields. [`NewRecord`] is
//! what a store appends and [`Record`] is what it returns. Records never
//! reference one another by id: every relationship is string-key equality.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::HashId;
use crate::core::identifiers::RecordId;
use crate::core::identifiers::ResultName;
use crate::core::identifiers::RunTag;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Record Kind
// ============================================================================

/// Discriminates the stored record kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Calibration bundles keyed by lineage.
    Calibration,
    /// Result bundles keyed by lineage and result name.
    Result,
    /// Global best-run pointer log.
    BestRun,
}

impl RecordKind {
    /// Returns the stable label used in logs and table names.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Calibration => "calibrations",
            Self::Result => "results",
            Self::BestRun => "best_runs",
        }
    }

    /// Returns true when rows of this kind carry a blob.
    #[must_use]
    pub const fn has_blob(self) -> bool {
        matches!(self, Self::Calibration | Self::Result)
    }
}

// ============================================================================
// SECTION: Insert Payloads
// ============================================================================

/// Calibration bundle to append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCalibration {
    /// Lineage key.
    pub hash_id: HashId,
    /// Optional free-text notes.
    pub notes: Option<String>,
    /// Archive name supplied by the writer.
    pub filename: String,
    /// Packed archive bytes.
    pub blob: Vec<u8>,
}

/// Result bundle to append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewResult {
    /// Lineage key.
    pub hash_id: HashId,
    /// Result kind within the lineage.
    pub name: ResultName,
    /// Optional run label.
    pub run_tag: Option<RunTag>,
    /// Optional free-text notes.
    pub notes: Option<String>,
    /// Archive name supplied by the writer.
    pub filename: String,
    /// Packed archive bytes.
    pub blob: Vec<u8>,
}

/// Best-run pointer to append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBestRun {
    /// Lineage the pointer refers to.
    pub calibration_hash_id: HashId,
    /// Run marked as current best.
    pub run_tag: RunTag,
}

/// A row to append, one variant per record kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewRecord {
    /// Calibration bundle.
    Calibration(NewCalibration),
    /// Result bundle.
    Result(NewResult),
    /// Best-run pointer.
    BestRun(NewBestRun),
}

impl NewRecord {
    /// Returns the kind of record being appended.
    #[must_use]
    pub const fn kind(&self) -> RecordKind {
        match self {
            Self::Calibration(_) => RecordKind::Calibration,
            Self::Result(_) => RecordKind::Result,
            Self::BestRun(_) => RecordKind::BestRun,
        }
    }

    /// Stamps the payload with its store-assigned identity.
    #[must_use]
    pub fn into_record(self, id: RecordId, created_at: Timestamp) -> Record {
        match self {
            Self::Calibration(new) => Record::Calibration(CalibrationRecord {
                meta: CalibrationMeta {
                    id,
                    hash_id: new.hash_id,
                    notes: new.notes,
                    filename: new.filename,
                    size: blob_size(&new.blob),
                    created_at,
                },
                blob: new.blob,
            }),
            Self::Result(new) => Record::Result(ResultRecord {
                meta: ResultMeta {
                    id,
                    hash_id: new.hash_id,
                    name: new.name,
                    run_tag: new.run_tag,
                    notes: new.notes,
                    filename: new.filename,
                    size: blob_size(&new.blob),
                    created_at,
                },
                blob: new.blob,
            }),
            Self::BestRun(new) => Record::BestRun(BestRunPointer {
                id,
                calibration_hash_id: new.calibration_hash_id,
                run_tag: new.run_tag,
                created_at,
            }),
        }
    }
}

/// Identity assigned to an appended row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InsertReceipt {
    /// Store-assigned row identifier.
    pub id: RecordId,
    /// Store-assigned creation time.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Stored Records
// ============================================================================

/// Calibration metadata without its blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalibrationMeta {
    /// Row identifier.
    pub id: RecordId,
    /// Lineage key.
    pub hash_id: HashId,
    /// Optional notes.
    pub notes: Option<String>,
    /// Archive name supplied by the writer.
    pub filename: String,
    /// Stored blob length in bytes.
    pub size: u64,
    /// Creation time.
    pub created_at: Timestamp,
}

/// Calibration row including its blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationRecord {
    /// Row metadata.
    pub meta: CalibrationMeta,
    /// Packed archive bytes.
    pub blob: Vec<u8>,
}

/// Result metadata without its blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultMeta {
    /// Row identifier.
    pub id: RecordId,
    /// Lineage key.
    pub hash_id: HashId,
    /// Result kind within the lineage.
    pub name: ResultName,
    /// Optional run label.
    pub run_tag: Option<RunTag>,
    /// Optional notes.
    pub notes: Option<String>,
    /// Archive name supplied by the writer.
    pub filename: String,
    /// Stored blob length in bytes.
    pub size: u64,
    /// Creation time.
    pub created_at: Timestamp,
}

/// Result row including its blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    /// Row metadata.
    pub meta: ResultMeta,
    /// Packed archive bytes.
    pub blob: Vec<u8>,
}

/// Entry in the global best-run pointer log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BestRunPointer {
    /// Row identifier.
    pub id: RecordId,
    /// Lineage the pointer refers to.
    pub calibration_hash_id: HashId,
    /// Run marked as current best.
    pub run_tag: RunTag,
    /// Creation time.
    pub created_at: Timestamp,
}

/// A stored row, one variant per record kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// Calibration bundle.
    Calibration(CalibrationRecord),
    /// Result bundle.
    Result(ResultRecord),
    /// Best-run pointer.
    BestRun(BestRunPointer),
}

impl Record {
    /// Returns the record kind.
    #[must_use]
    pub const fn kind(&self) -> RecordKind {
        match self {
            Self::Calibration(_) => RecordKind::Calibration,
            Self::Result(_) => RecordKind::Result,
            Self::BestRun(_) => RecordKind::BestRun,
        }
    }

    /// Returns the row identifier.
    #[must_use]
    pub const fn id(&self) -> RecordId {
        match self {
            Self::Calibration(record) => record.meta.id,
            Self::Result(record) => record.meta.id,
            Self::BestRun(pointer) => pointer.id,
        }
    }

    /// Returns the creation time.
    #[must_use]
    pub const fn created_at(&self) -> Timestamp {
        match self {
            Self::Calibration(record) => record.meta.created_at,
            Self::Result(record) => record.meta.created_at,
            Self::BestRun(pointer) => pointer.created_at,
        }
    }

    /// Drops the blob, keeping metadata only.
    #[must_use]
    pub fn without_blob(self) -> Self {
        match self {
            Self::Calibration(mut record) => {
                record.blob = Vec::new();
                Self::Calibration(record)
            }
            Self::Result(mut record) => {
                record.blob = Vec::new();
                Self::Result(record)
            }
            Self::BestRun(pointer) => Self::BestRun(pointer),
        }
    }
}

/// Returns the blob length as a `u64`.
fn blob_size(blob: &[u8]) -> u64 {
    u64::try_from(blob.len()).unwrap_or(u64::MAX)
}
