// crates/bundle-vault-core/src/core/mod.rs
// ============================================================================
// Module: Bundle Vault Core Types
// Description: Identifiers, timestamps, record kinds, and selectors.
// Purpose: Group the data model shared by stores, server, and client.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Core types are backend-agnostic and carry no I/O.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod identifiers;
pub mod records;
pub mod selection;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use identifiers::HashId;
pub use identifiers::RecordId;
pub use identifiers::ResultName;
pub use identifiers::RunTag;
pub use records::BestRunPointer;
pub use records::CalibrationMeta;
pub use records::CalibrationRecord;
pub use records::InsertReceipt;
pub use records::NewBestRun;
pub use records::NewCalibration;
pub use records::NewRecord;
pub use records::NewResult;
pub use records::Record;
pub use records::RecordKind;
pub use records::ResultMeta;
pub use records::ResultRecord;
pub use selection::KeyField;
pub use selection::ListLimit;
pub use selection::Predicate;
pub use selection::Selector;
pub use time::Timestamp;
