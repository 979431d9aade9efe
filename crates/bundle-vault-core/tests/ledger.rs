// crates/bundle-vault-core/tests/ledger.rs
// ============================================================================
// Module: Ledger Tests
// Description: Validate inserts and listings over the in-memory store.
// Purpose: Ensure rejected writes leave no rows and listings are newest first.
// Dependencies: bundle-vault-core
// ============================================================================

//! Ledger behavior tests for validated inserts and metadata listings.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    reason = "Test-only assertions and helpers are permitted."
)]

use bundle_vault_core::HashId;
use bundle_vault_core::InMemoryRecordStore;
use bundle_vault_core::ListLimit;
use bundle_vault_core::NewBestRun;
use bundle_vault_core::NewCalibration;
use bundle_vault_core::NewResult;
use bundle_vault_core::RecordKind;
use bundle_vault_core::RecordLedger;
use bundle_vault_core::ResultName;
use bundle_vault_core::RunTag;
use bundle_vault_core::SharedRecordStore;
use bundle_vault_core::VaultError;

fn ledger() -> RecordLedger {
    RecordLedger::new(SharedRecordStore::from_store(InMemoryRecordStore::new()))
}

fn calibration(hash_id: &str, blob: &[u8]) -> NewCalibration {
    NewCalibration {
        hash_id: HashId::new(hash_id),
        notes: None,
        filename: "calibration_bundle.zip".to_string(),
        blob: blob.to_vec(),
    }
}

fn result(hash_id: &str, name: &str, run_tag: Option<&str>) -> NewResult {
    NewResult {
        hash_id: HashId::new(hash_id),
        name: ResultName::new(name),
        run_tag: run_tag.map(RunTag::new),
        notes: None,
        filename: "results_bundle.zip".to_string(),
        blob: vec![1, 2, 3],
    }
}

#[test]
fn rejects_empty_calibration_key_without_writing() {
    let ledger = ledger();
    let err = ledger.insert_calibration(calibration("  ", b"zip")).unwrap_err();
    assert!(matches!(err, VaultError::Validation(message) if message == "hashID is required"));
    assert_eq!(ledger.row_count(RecordKind::Calibration).unwrap(), 0);
}

#[test]
fn rejects_empty_calibration_blob_without_writing() {
    let ledger = ledger();
    let err = ledger.insert_calibration(calibration("cal-a", b"")).unwrap_err();
    assert!(matches!(err, VaultError::Validation(_)));
    assert_eq!(ledger.row_count(RecordKind::Calibration).unwrap(), 0);
}

#[test]
fn rejects_results_missing_name_or_blob() {
    let ledger = ledger();
    let err = ledger.insert_result(result("cal-a", "", None)).unwrap_err();
    assert!(matches!(err, VaultError::Validation(message) if message == "name is required"));
    let mut empty = result("cal-a", "rb", None);
    empty.blob.clear();
    assert!(matches!(ledger.insert_result(empty), Err(VaultError::Validation(_))));
    assert_eq!(ledger.row_count(RecordKind::Result).unwrap(), 0);
}

#[test]
fn rejects_best_run_pointer_with_empty_keys() {
    let ledger = ledger();
    let missing_run = NewBestRun {
        calibration_hash_id: HashId::new("cal-a"),
        run_tag: RunTag::new(""),
    };
    assert!(matches!(ledger.insert_best_run_pointer(missing_run), Err(VaultError::Validation(_))));
    let missing_key = NewBestRun {
        calibration_hash_id: HashId::new(""),
        run_tag: RunTag::new("run-1"),
    };
    assert!(matches!(ledger.insert_best_run_pointer(missing_key), Err(VaultError::Validation(_))));
    assert_eq!(ledger.row_count(RecordKind::BestRun).unwrap(), 0);
}

#[test]
fn result_receipt_echoes_run_tag_and_drops_empty_tags() {
    let ledger = ledger();
    let tagged = ledger.insert_result(result("cal-a", "rb", Some("run-7"))).unwrap();
    assert_eq!(tagged.run_tag, Some(RunTag::new("run-7")));
    let untagged = ledger.insert_result(result("cal-a", "rb", Some(""))).unwrap();
    assert_eq!(untagged.run_tag, None);
    assert!(untagged.id > tagged.id);
}

#[test]
fn lists_calibrations_newest_first_without_blobs() {
    let ledger = ledger();
    let mut ids = Vec::new();
    for blob in [b"one".as_slice(), b"two", b"three"] {
        ids.push(ledger.insert_calibration(calibration("cal-a", blob)).unwrap().id);
    }
    let items = ledger.list_calibrations().unwrap();
    let listed: Vec<_> = items.iter().map(|item| item.id).collect();
    ids.reverse();
    assert_eq!(listed, ids);
    assert!(items.windows(2).all(|pair| pair[0].created_at >= pair[1].created_at));
    assert_eq!(items[0].size, 5);
}

#[test]
fn blank_notes_are_stored_as_absent() {
    let ledger = ledger();
    let mut new = calibration("cal-a", b"zip");
    new.notes = Some("   ".to_string());
    ledger.insert_calibration(new).unwrap();
    let items = ledger.list_calibrations().unwrap();
    assert_eq!(items[0].notes, None);
}

#[test]
fn lists_results_for_one_lineage_only() {
    let ledger = ledger();
    ledger.insert_result(result("cal-a", "rb", None)).unwrap();
    ledger.insert_result(result("cal-b", "rb", None)).unwrap();
    ledger.insert_result(result("cal-a", "t1", Some("run-2"))).unwrap();
    let items = ledger.list_results(&HashId::new("cal-a")).unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].name.as_str(), "t1");
    assert!(items.iter().all(|item| item.hash_id.as_str() == "cal-a"));
    assert!(matches!(ledger.list_results(&HashId::new("")), Err(VaultError::Validation(_))));
}

#[test]
fn best_run_listing_respects_clamped_limits() {
    let ledger = ledger();
    for index in 0 .. 5 {
        ledger
            .insert_best_run_pointer(NewBestRun {
                calibration_hash_id: HashId::new("cal-a"),
                run_tag: RunTag::new(format!("run-{index}")),
            })
            .unwrap();
    }
    let zero = ledger.list_best_run_pointers(ListLimit::resolve(Some(0))).unwrap();
    assert_eq!(zero.len(), 1);
    assert_eq!(zero[0].run_tag.as_str(), "run-4");
    let default = ledger.list_best_run_pointers(ListLimit::resolve(None)).unwrap();
    assert_eq!(default.len(), 5);
    let large = ledger.list_best_run_pointers(ListLimit::resolve(Some(500))).unwrap();
    assert_eq!(large.len(), 5);
}
