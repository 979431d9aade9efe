// crates/bundle-vault-core/src/runtime/store.rs
// ============================================================================
// Module: Bundle Vault In-Memory Store
// Description: In-memory record store and the shared store wrapper.
// Purpose: Provide a deterministic store without external deps.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`InMemoryRecordStore`] keeps one append-only vector per record kind and
//! applies the shared selector predicates and newest-first ordering. It backs
//! tests and `store.type = "memory"` deployments; contents vanish with the
//! process. [`SharedRecordStore`] wraps any store in a clonable `Arc`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use crate::core::InsertReceipt;
use crate::core::NewRecord;
use crate::core::Record;
use crate::core::RecordId;
use crate::core::RecordKind;
use crate::core::Selector;
use crate::core::Timestamp;
use crate::core::selection::newest_first;
use crate::interfaces::RecordStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// Rows of a single record kind.
#[derive(Debug, Default)]
struct Table {
    /// Last assigned row id.
    last_id: i64,
    /// Rows in insertion order.
    rows: Vec<Record>,
}

/// In-memory record store for tests and ephemeral deployments.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRecordStore {
    /// Tables keyed by record kind, protected by a mutex.
    tables: Arc<Mutex<HashMap<RecordKind, Table>>>,
}

impl InMemoryRecordStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn append(&self, record: NewRecord) -> Result<InsertReceipt, StoreError> {
        let mut guard = self
            .tables
            .lock()
            .map_err(|_| StoreError::Store("record store mutex poisoned".to_string()))?;
        let table = guard.entry(record.kind()).or_default();
        let next_id = table
            .last_id
            .checked_add(1)
            .ok_or_else(|| StoreError::Corrupt("record id overflow".to_string()))?;
        let newest = table.rows.iter().map(Record::created_at).max();
        let created_at = Timestamp::now().not_before(newest);
        let id = RecordId::new(next_id);
        table.rows.push(record.into_record(id, created_at));
        table.last_id = next_id;
        drop(guard);
        Ok(InsertReceipt {
            id,
            created_at,
        })
    }

    fn select(&self, selector: &Selector) -> Result<Vec<Record>, StoreError> {
        let mut matches: Vec<Record> = {
            let guard = self
                .tables
                .lock()
                .map_err(|_| StoreError::Store("record store mutex poisoned".to_string()))?;
            guard
                .get(&selector.kind())
                .map(|table| {
                    table.rows.iter().filter(|row| selector.matches(row)).cloned().collect()
                })
                .unwrap_or_default()
        };
        matches.sort_by(newest_first);
        if let Some(limit) = selector.row_limit() {
            matches.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }
        if !selector.includes_blob() {
            matches = matches.into_iter().map(Record::without_blob).collect();
        }
        Ok(matches)
    }

    fn count(&self, kind: RecordKind) -> Result<u64, StoreError> {
        let guard = self
            .tables
            .lock()
            .map_err(|_| StoreError::Store("record store mutex poisoned".to_string()))?;
        let rows = guard.get(&kind).map_or(0, |table| table.rows.len());
        drop(guard);
        Ok(u64::try_from(rows).unwrap_or(u64::MAX))
    }
}

// ============================================================================
// SECTION: Shared Store Wrapper
// ============================================================================

/// Shared record store backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedRecordStore {
    /// Inner store implementation.
    inner: Arc<dyn RecordStore + Send + Sync>,
}

impl SharedRecordStore {
    /// Wraps a record store in a shared, clonable wrapper.
    #[must_use]
    pub fn from_store(store: impl RecordStore + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Wraps an existing shared store.
    #[must_use]
    pub const fn new(store: Arc<dyn RecordStore + Send + Sync>) -> Self {
        Self {
            inner: store,
        }
    }
}

impl RecordStore for SharedRecordStore {
    fn append(&self, record: NewRecord) -> Result<InsertReceipt, StoreError> {
        self.inner.append(record)
    }

    fn select(&self, selector: &Selector) -> Result<Vec<Record>, StoreError> {
        self.inner.select(selector)
    }

    fn count(&self, kind: RecordKind) -> Result<u64, StoreError> {
        self.inner.count(kind)
    }
}
