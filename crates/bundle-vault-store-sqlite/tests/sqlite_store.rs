// crates/bundle-vault-store-sqlite/tests/sqlite_store.rs
// ============================================================================
// Module: SQLite Store Tests
// Description: Validate SQLite RecordStore behavior.
// Purpose: Ensure durable appends, newest-first selection, and schema checks.
// Dependencies: bundle-vault-store-sqlite, bundle-vault-core, rusqlite, tempfile
// ============================================================================

//! ## Overview
//! Conformance tests for the SQLite-backed record store. Exercises
//! persistence across reopen, selector filtering and ordering, blob loading,
//! and schema version enforcement.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::thread;

use bundle_vault_core::HashId;
use bundle_vault_core::KeyField;
use bundle_vault_core::NewBestRun;
use bundle_vault_core::NewCalibration;
use bundle_vault_core::NewRecord;
use bundle_vault_core::NewResult;
use bundle_vault_core::Record;
use bundle_vault_core::RecordKind;
use bundle_vault_core::RecordLedger;
use bundle_vault_core::RecordStore;
use bundle_vault_core::ResultName;
use bundle_vault_core::ResultQuery;
use bundle_vault_core::RunTag;
use bundle_vault_core::SelectionEngine;
use bundle_vault_core::Selector;
use bundle_vault_core::SharedRecordStore;
use bundle_vault_core::StoreError;
use bundle_vault_store_sqlite::SqliteRecordStore;
use bundle_vault_store_sqlite::SqliteStoreConfig;
use bundle_vault_store_sqlite::SqliteStoreError;
use bundle_vault_store_sqlite::SqliteStoreMode;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn open(path: &Path) -> SqliteRecordStore {
    SqliteRecordStore::new(SqliteStoreConfig::new(path)).expect("open sqlite store")
}

fn calibration(hash_id: &str, blob: &[u8]) -> NewRecord {
    NewRecord::Calibration(NewCalibration {
        hash_id: HashId::new(hash_id),
        notes: Some(format!("notes for {hash_id}")),
        filename: "calibration_bundle.zip".to_string(),
        blob: blob.to_vec(),
    })
}

fn result(run_tag: Option<&str>, blob: &[u8]) -> NewRecord {
    NewRecord::Result(NewResult {
        hash_id: HashId::new("g"),
        name: ResultName::new("n"),
        run_tag: run_tag.map(RunTag::new),
        notes: None,
        filename: "results_bundle.zip".to_string(),
        blob: blob.to_vec(),
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn rows_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("vault.db");
    let receipt = open(&path).append(calibration("cal-a", b"payload")).unwrap();

    let reopened = open(&path);
    assert_eq!(reopened.count(RecordKind::Calibration).unwrap(), 1);
    let rows = reopened
        .select(&Selector::new(RecordKind::Calibration).require(KeyField::HashId, "cal-a").with_blob())
        .unwrap();
    let [Record::Calibration(row)] = rows.as_slice() else {
        panic!("expected one calibration row, got {rows:?}");
    };
    assert_eq!(row.meta.id, receipt.id);
    assert_eq!(row.meta.created_at, receipt.created_at);
    assert_eq!(row.meta.size, 7);
    assert_eq!(row.meta.notes.as_deref(), Some("notes for cal-a"));
    assert_eq!(row.blob, b"payload");
}

#[test]
fn metadata_selects_leave_blobs_unloaded() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir.path().join("vault.db"));
    store.append(calibration("cal-a", b"payload")).unwrap();
    let rows = store.select(&Selector::new(RecordKind::Calibration)).unwrap();
    let [Record::Calibration(row)] = rows.as_slice() else {
        panic!("expected one calibration row");
    };
    assert!(row.blob.is_empty());
    assert_eq!(row.meta.size, 7);
}

#[test]
fn selection_orders_newest_first_with_id_tie_break() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir.path().join("vault.db"));
    for index in 0 .. 20 {
        store.append(calibration("cal-a", format!("blob-{index}").as_bytes())).unwrap();
    }
    let rows = store.select(&Selector::new(RecordKind::Calibration)).unwrap();
    assert_eq!(rows.len(), 20);
    assert!(rows.windows(2).all(|pair| pair[0].id() > pair[1].id()));
    assert!(rows.windows(2).all(|pair| pair[0].created_at() >= pair[1].created_at()));

    let newest = store.select(&Selector::new(RecordKind::Calibration).newest().with_blob()).unwrap();
    let [Record::Calibration(row)] = newest.as_slice() else {
        panic!("expected newest row");
    };
    assert_eq!(row.blob, b"blob-19");
}

#[test]
fn optional_run_tag_is_omitted_not_null_matched() {
    let dir = TempDir::new().unwrap();
    let store = SharedRecordStore::from_store(open(&dir.path().join("vault.db")));
    store.append(result(Some("r1"), b"r1")).unwrap();
    store.append(result(Some("r2"), b"r2")).unwrap();
    store.append(result(None, b"none")).unwrap();
    let engine = SelectionEngine::new(store);

    let query = |run_tag: Option<&str>| ResultQuery {
        hash_id: HashId::new("g"),
        name: ResultName::new("n"),
        run_tag: run_tag.map(RunTag::new),
    };
    assert_eq!(engine.latest_result(&query(None)).unwrap().unwrap().blob, b"none");
    assert_eq!(engine.latest_result(&query(Some("r1"))).unwrap().unwrap().blob, b"r1");
    assert!(engine.latest_result(&query(Some("r3"))).unwrap().is_none());
}

#[test]
fn best_run_log_keeps_history() {
    let dir = TempDir::new().unwrap();
    let store = SharedRecordStore::from_store(open(&dir.path().join("vault.db")));
    let ledger = RecordLedger::new(store.clone());
    for (key, run) in [("A", "1"), ("B", "2"), ("A", "3"), ("B", "4")] {
        ledger
            .insert_best_run_pointer(NewBestRun {
                calibration_hash_id: HashId::new(key),
                run_tag: RunTag::new(run),
            })
            .unwrap();
    }
    let latest = SelectionEngine::new(store).latest_best_run_pointer().unwrap().unwrap();
    assert_eq!(latest.calibration_hash_id.as_str(), "B");
    assert_eq!(latest.run_tag.as_str(), "4");
    let history = ledger.list_best_run_pointers(bundle_vault_core::ListLimit::resolve(Some(3))).unwrap();
    let runs: Vec<_> = history.iter().map(|pointer| pointer.run_tag.as_str()).collect();
    assert_eq!(runs, vec!["4", "3", "2"]);
}

#[test]
fn concurrent_appends_assign_unique_monotonic_ids() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir.path().join("vault.db"));
    let handles: Vec<_> = (0 .. 4)
        .map(|worker| {
            let store = store.clone();
            thread::spawn(move || {
                for index in 0 .. 10 {
                    store.append(calibration(&format!("w{worker}"), format!("{index}").as_bytes())).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    let rows = store.select(&Selector::new(RecordKind::Calibration)).unwrap();
    assert_eq!(rows.len(), 40);
    assert!(rows.windows(2).all(|pair| pair[0].id() > pair[1].id()));
    assert!(rows.windows(2).all(|pair| pair[0].created_at() >= pair[1].created_at()));
}

#[test]
fn predicates_on_foreign_fields_are_rejected() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir.path().join("vault.db"));
    let err = store
        .select(&Selector::new(RecordKind::Calibration).require(KeyField::Name, "n"))
        .unwrap_err();
    assert!(matches!(err, StoreError::Invalid(_)));
}

#[test]
fn unsupported_schema_version_fails_closed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vault.db");
    drop(open(&path));
    let connection = rusqlite::Connection::open(&path).unwrap();
    connection.execute("UPDATE store_meta SET version = 99", []).unwrap();
    drop(connection);
    let err = SqliteRecordStore::new(SqliteStoreConfig::new(&path)).unwrap_err();
    assert!(matches!(err, SqliteStoreError::VersionMismatch(_)));
}

#[test]
fn directory_paths_are_rejected() {
    let dir = TempDir::new().unwrap();
    let err = SqliteRecordStore::new(SqliteStoreConfig::new(dir.path())).unwrap_err();
    assert!(matches!(err, SqliteStoreError::Invalid(_)));
}

#[test]
fn delete_journal_mode_opens() {
    let dir = TempDir::new().unwrap();
    let mut config = SqliteStoreConfig::new(dir.path().join("vault.db"));
    config.journal_mode = SqliteStoreMode::Delete;
    let store = SqliteRecordStore::new(config).unwrap();
    store.append(calibration("cal-a", b"x")).unwrap();
    assert_eq!(store.count(RecordKind::Calibration).unwrap(), 1);
}
