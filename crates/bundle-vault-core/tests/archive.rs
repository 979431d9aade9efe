// crates/bundle-vault-core/tests/archive.rs
// ============================================================================
// Module: Archive Codec Tests
// Description: Validate bundle packing and unpacking on disk.
// Purpose: Ensure failure modes are typed and unpacking stays in bounds.
// Dependencies: bundle-vault-core, tempfile, zip
// ============================================================================

//! Archive codec tests for packing, unpacking, and corrupt input.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::fs;
use std::path::PathBuf;

use bundle_vault_core::ArchiveEntry;
use bundle_vault_core::ArchiveError;
use bundle_vault_core::archive::list_entries;
use bundle_vault_core::archive::pack_entries;
use bundle_vault_core::archive::pack_files;
use bundle_vault_core::archive::unpack;
use tempfile::TempDir;

#[test]
fn pack_files_round_trips_through_unpack() {
    let source = TempDir::new().unwrap();
    let nested = source.path().join("nested");
    fs::create_dir_all(&nested).unwrap();
    let first = source.path().join("params.json");
    let second = nested.join("weights.bin");
    fs::write(&first, br#"{"alpha": 1}"#).unwrap();
    fs::write(&second, [0_u8, 159, 146, 150]).unwrap();

    let blob = pack_files(&[first, second]).unwrap();
    let mut names = list_entries(&blob).unwrap();
    names.sort();
    assert_eq!(names, vec!["params.json".to_string(), "weights.bin".to_string()]);

    let destination = TempDir::new().unwrap();
    let target = destination.path().join("out").join("deeper");
    let written = unpack(&blob, &target).unwrap();
    assert_eq!(written.len(), 2);
    assert_eq!(fs::read(target.join("params.json")).unwrap(), br#"{"alpha": 1}"#);
    assert_eq!(fs::read(target.join("weights.bin")).unwrap(), [0_u8, 159, 146, 150]);
}

#[test]
fn pack_rejects_empty_input() {
    assert!(matches!(pack_entries(Vec::new()), Err(ArchiveError::EmptyInput)));
    assert!(matches!(pack_files(&[]), Err(ArchiveError::EmptyInput)));
}

#[test]
fn pack_rejects_missing_source() {
    let dir = TempDir::new().unwrap();
    let missing: PathBuf = dir.path().join("absent.json");
    let err = pack_files(&[missing]).unwrap_err();
    assert!(matches!(err, ArchiveError::SourceNotFound(path) if path.ends_with("absent.json")));
}

#[test]
fn unpack_rejects_non_archive_bytes() {
    let dir = TempDir::new().unwrap();
    let err = unpack(b"definitely not a zip", dir.path()).unwrap_err();
    assert!(matches!(err, ArchiveError::CorruptArchive(_)));
    assert!(matches!(list_entries(b""), Err(ArchiveError::CorruptArchive(_))));
}

#[test]
fn unpack_overwrites_existing_files() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("report.txt"), b"stale").unwrap();
    let blob = pack_entries(vec![ArchiveEntry::new("report.txt", b"fresh".to_vec())]).unwrap();
    unpack(&blob, dir.path()).unwrap();
    assert_eq!(fs::read(dir.path().join("report.txt")).unwrap(), b"fresh");
}

#[test]
fn entry_names_drop_directory_components() {
    let blob =
        pack_entries(vec![ArchiveEntry::new("runs/2026/summary.csv", b"a,b".to_vec())]).unwrap();
    assert_eq!(list_entries(&blob).unwrap(), vec!["summary.csv".to_string()]);
}

#[test]
fn unpack_refuses_entries_that_escape_destination() {
    use std::io::Cursor;
    use std::io::Write;

    let mut buffer = Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut buffer);
        writer.start_file("../escape.txt", zip::write::SimpleFileOptions::default()).unwrap();
        writer.write_all(b"nope").unwrap();
        writer.finish().unwrap();
    }
    let root = TempDir::new().unwrap();
    let destination = root.path().join("inner");
    let err = unpack(&buffer.into_inner(), &destination).unwrap_err();
    assert!(matches!(err, ArchiveError::CorruptArchive(_)));
    assert!(!root.path().join("escape.txt").exists());
}

#[test]
fn pack_rejects_inputs_sharing_a_base_name() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("a")).unwrap();
    fs::create_dir_all(dir.path().join("b")).unwrap();
    let first = dir.path().join("a").join("x.json");
    let second = dir.path().join("b").join("x.json");
    fs::write(&first, b"{}").unwrap();
    fs::write(&second, b"[]").unwrap();
    let err = pack_files(&[first, second]).unwrap_err();
    assert!(matches!(&err, ArchiveError::DuplicateEntry(name) if name == "x.json"));
    assert_eq!(err.to_string(), "duplicate archive entry name: x.json");
}
