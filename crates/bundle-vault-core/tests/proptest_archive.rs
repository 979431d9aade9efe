// crates/bundle-vault-core/tests/proptest_archive.rs
// ============================================================================
// Module: Archive and Limit Property-Based Tests
// Description: Property tests for the archive round-trip law and limit
//              clamping.
// Purpose: Detect data loss and out-of-range limits across wide inputs.
// ============================================================================

//! Property-based tests for archive and list-limit invariants.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::collections::BTreeMap;
use std::fs;

use bundle_vault_core::ArchiveEntry;
use bundle_vault_core::ListLimit;
use bundle_vault_core::archive::pack_entries;
use bundle_vault_core::archive::unpack;
use proptest::prelude::*;
use tempfile::TempDir;

fn entries_strategy() -> impl Strategy<Value = BTreeMap<String, Vec<u8>>> {
    prop::collection::btree_map(
        "[a-z][a-z0-9_]{0,11}\\.(json|bin|csv)",
        prop::collection::vec(any::<u8>(), 0 .. 512),
        1 .. 6,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn unpack_reproduces_packed_entries(files in entries_strategy()) {
        let entries = files
            .iter()
            .map(|(name, bytes)| ArchiveEntry::new(name, bytes.clone()))
            .collect();
        let blob = pack_entries(entries).unwrap();
        let dir = TempDir::new().unwrap();
        let written = unpack(&blob, dir.path()).unwrap();
        prop_assert_eq!(written.len(), files.len());
        for (name, bytes) in &files {
            let restored = fs::read(dir.path().join(name)).unwrap();
            prop_assert_eq!(&restored, bytes);
        }
    }

    #[test]
    fn list_limit_always_lands_in_range(requested in any::<i64>()) {
        let limit = ListLimit::resolve(Some(requested)).get();
        prop_assert!((1 ..= 100).contains(&limit));
        if (1 ..= 100).contains(&requested) {
            prop_assert_eq!(i64::from(limit), requested);
        }
    }
}

#[test]
fn list_limit_defaults_and_bounds() {
    assert_eq!(ListLimit::resolve(None).get(), 10);
    assert_eq!(ListLimit::resolve(Some(0)).get(), 1);
    assert_eq!(ListLimit::resolve(Some(-4)).get(), 1);
    assert_eq!(ListLimit::resolve(Some(500)).get(), 100);
}
