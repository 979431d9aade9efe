// crates/bundle-vault-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Record Store
// Description: Durable RecordStore backed by SQLite WAL.
// Purpose: Persist calibration, result, and best-run rows append-only.
// Dependencies: bundle-vault-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! This module implements a durable [`RecordStore`] using `SQLite`. Each
//! record kind has its own append-only table with an autoincrement id and a
//! millisecond `created_at` column. Lookups use the shared newest-first
//! ordering (`created_at DESC, id DESC`).
//!
//! ## Invariants
//! - Every operation opens a [`StoreSession`], runs exactly one transaction,
//!   and closes its connection when the session drops, on every exit path.
//! - Appends run in an immediate transaction so `created_at` stays monotonic
//!   with `id` under concurrent writers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use bundle_vault_core::BestRunPointer;
use bundle_vault_core::CalibrationMeta;
use bundle_vault_core::CalibrationRecord;
use bundle_vault_core::HashId;
use bundle_vault_core::InsertReceipt;
use bundle_vault_core::NewRecord;
use bundle_vault_core::Record;
use bundle_vault_core::RecordId;
use bundle_vault_core::RecordKind;
use bundle_vault_core::RecordStore;
use bundle_vault_core::ResultMeta;
use bundle_vault_core::ResultName;
use bundle_vault_core::ResultRecord;
use bundle_vault_core::RunTag;
use bundle_vault_core::Selector;
use bundle_vault_core::StoreError;
use bundle_vault_core::Timestamp;
use bundle_vault_core::selection::NEWEST_FIRST_SQL;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::Transaction;
use rusqlite::TransactionBehavior;
use rusqlite::params;
use rusqlite::params_from_iter;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

/// Table definitions created on first open.
const SCHEMA_SQL: &str = "CREATE TABLE IF NOT EXISTS calibrations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        hash_id TEXT NOT NULL,
        notes TEXT,
        filename TEXT NOT NULL,
        blob BLOB NOT NULL,
        created_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_calibrations_hash_id ON calibrations (hash_id);
    CREATE INDEX IF NOT EXISTS idx_calibrations_created ON calibrations (created_at, id);
    CREATE TABLE IF NOT EXISTS results (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        hash_id TEXT NOT NULL,
        name TEXT NOT NULL,
        run_tag TEXT,
        notes TEXT,
        filename TEXT NOT NULL,
        blob BLOB NOT NULL,
        created_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_results_lookup ON results (hash_id, name, run_tag);
    CREATE INDEX IF NOT EXISTS idx_results_created ON results (created_at, id);
    CREATE TABLE IF NOT EXISTS best_runs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        calibration_hash_id TEXT NOT NULL,
        run_tag TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_best_runs_hash_id ON best_runs (calibration_hash_id);
    CREATE INDEX IF NOT EXISTS idx_best_runs_created ON best_runs (created_at, id);";

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` record store.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a config for `path` with default pragmas.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store corruption.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store input or data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
        }
    }
}

impl From<rusqlite::Error> for SqliteStoreError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Db(error.to_string())
    }
}

// ============================================================================
// SECTION: Session
// ============================================================================

/// One scoped connection used by a single store operation.
///
/// The connection closes when the session drops.
struct StoreSession {
    /// Connection owned by this session.
    connection: Connection,
}

impl StoreSession {
    /// Opens a session with pragmas applied.
    fn open(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        Ok(Self {
            connection: open_connection(config)?,
        })
    }

    /// Starts a deferred read transaction.
    fn read(&mut self) -> Result<Transaction<'_>, SqliteStoreError> {
        Ok(self.connection.transaction()?)
    }

    /// Starts an immediate write transaction.
    fn write(&mut self) -> Result<Transaction<'_>, SqliteStoreError> {
        Ok(self.connection.transaction_with_behavior(TransactionBehavior::Immediate)?)
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed record store with WAL support.
#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    /// Store configuration used to open each session.
    config: SqliteStoreConfig,
}

impl SqliteRecordStore {
    /// Opens an `SQLite`-backed record store, creating the schema if absent.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized, or when it carries an unsupported schema version.
    pub fn new(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut session = StoreSession::open(&config)?;
        initialize_schema(&mut session)?;
        Ok(Self {
            config,
        })
    }

    /// Returns the database path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Appends one row inside an immediate transaction.
    fn append_record(&self, record: NewRecord) -> Result<InsertReceipt, SqliteStoreError> {
        let table = record.kind().label();
        let mut session = StoreSession::open(&self.config)?;
        let tx = session.write()?;
        let newest: Option<i64> =
            tx.query_row(&format!("SELECT MAX(created_at) FROM {table}"), params![], |row| {
                row.get(0)
            })?;
        let created_at = Timestamp::now().not_before(newest.map(Timestamp::from_unix_millis));
        let millis = created_at.unix_millis();
        match record {
            NewRecord::Calibration(new) => {
                tx.execute(
                    "INSERT INTO calibrations (hash_id, notes, filename, blob, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![new.hash_id.as_str(), new.notes, new.filename, new.blob, millis],
                )?;
            }
            NewRecord::Result(new) => {
                tx.execute(
                    "INSERT INTO results (hash_id, name, run_tag, notes, filename, blob, \
                     created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        new.hash_id.as_str(),
                        new.name.as_str(),
                        new.run_tag.as_ref().map(RunTag::as_str),
                        new.notes,
                        new.filename,
                        new.blob,
                        millis
                    ],
                )?;
            }
            NewRecord::BestRun(new) => {
                tx.execute(
                    "INSERT INTO best_runs (calibration_hash_id, run_tag, created_at) VALUES \
                     (?1, ?2, ?3)",
                    params![new.calibration_hash_id.as_str(), new.run_tag.as_str(), millis],
                )?;
            }
        }
        let id = RecordId::new(tx.last_insert_rowid());
        tx.commit()?;
        Ok(InsertReceipt {
            id,
            created_at,
        })
    }

    /// Runs a selector as one read transaction.
    fn select_records(&self, selector: &Selector) -> Result<Vec<Record>, SqliteStoreError> {
        let kind = selector.kind();
        let mut clauses = Vec::with_capacity(selector.predicates().len());
        for (index, predicate) in selector.predicates().iter().enumerate() {
            if !predicate.field.applies_to(kind) {
                return Err(SqliteStoreError::Invalid(format!(
                    "{} is not a key of {}",
                    predicate.field.column(),
                    kind.label()
                )));
            }
            clauses.push(format!("{} = ?{}", predicate.field.column(), index + 1));
        }
        let mut sql = format!(
            "SELECT {} FROM {}",
            select_columns(kind, selector.includes_blob()),
            kind.label()
        );
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push(' ');
        sql.push_str(NEWEST_FIRST_SQL);
        if let Some(limit) = selector.row_limit() {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let include_blob = selector.includes_blob();
        let mut session = StoreSession::open(&self.config)?;
        let tx = session.read()?;
        let records = {
            let mut statement = tx.prepare(&sql)?;
            let values = selector.predicates().iter().map(|predicate| predicate.value.as_str());
            let rows = statement.query_map(params_from_iter(values), |row| {
                decode_row(kind, include_blob, row)
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        tx.commit()?;
        Ok(records)
    }

    /// Counts the rows of one table.
    fn count_records(&self, kind: RecordKind) -> Result<u64, SqliteStoreError> {
        let mut session = StoreSession::open(&self.config)?;
        let tx = session.read()?;
        let count: i64 =
            tx.query_row(&format!("SELECT COUNT(*) FROM {}", kind.label()), params![], |row| {
                row.get(0)
            })?;
        tx.commit()?;
        u64::try_from(count)
            .map_err(|_| SqliteStoreError::Corrupt(format!("negative row count: {count}")))
    }
}

impl RecordStore for SqliteRecordStore {
    fn append(&self, record: NewRecord) -> Result<InsertReceipt, StoreError> {
        self.append_record(record).map_err(StoreError::from)
    }

    fn select(&self, selector: &Selector) -> Result<Vec<Record>, StoreError> {
        self.select_records(selector).map_err(StoreError::from)
    }

    fn count(&self, kind: RecordKind) -> Result<u64, StoreError> {
        self.count_records(kind).map_err(StoreError::from)
    }
}

// ============================================================================
// SECTION: Row Decoding
// ============================================================================

/// Returns the column list for `kind`; the blob column is always last.
fn select_columns(kind: RecordKind, include_blob: bool) -> String {
    let base = match kind {
        RecordKind::Calibration => "id, hash_id, notes, filename, length(blob), created_at",
        RecordKind::Result => {
            "id, hash_id, name, run_tag, notes, filename, length(blob), created_at"
        }
        RecordKind::BestRun => "id, calibration_hash_id, run_tag, created_at",
    };
    if include_blob && kind.has_blob() { format!("{base}, blob") } else { base.to_string() }
}

/// Decodes one row selected with [`select_columns`].
fn decode_row(kind: RecordKind, include_blob: bool, row: &Row<'_>) -> rusqlite::Result<Record> {
    match kind {
        RecordKind::Calibration => {
            let blob = if include_blob { row.get(6)? } else { Vec::new() };
            Ok(Record::Calibration(CalibrationRecord {
                meta: CalibrationMeta {
                    id: RecordId::new(row.get(0)?),
                    hash_id: HashId::new(row.get::<_, String>(1)?),
                    notes: row.get(2)?,
                    filename: row.get(3)?,
                    size: byte_length(row.get(4)?),
                    created_at: Timestamp::from_unix_millis(row.get(5)?),
                },
                blob,
            }))
        }
        RecordKind::Result => {
            let blob = if include_blob { row.get(8)? } else { Vec::new() };
            Ok(Record::Result(ResultRecord {
                meta: ResultMeta {
                    id: RecordId::new(row.get(0)?),
                    hash_id: HashId::new(row.get::<_, String>(1)?),
                    name: ResultName::new(row.get::<_, String>(2)?),
                    run_tag: row.get::<_, Option<String>>(3)?.map(RunTag::new),
                    notes: row.get(4)?,
                    filename: row.get(5)?,
                    size: byte_length(row.get(6)?),
                    created_at: Timestamp::from_unix_millis(row.get(7)?),
                },
                blob,
            }))
        }
        RecordKind::BestRun => Ok(Record::BestRun(BestRunPointer {
            id: RecordId::new(row.get(0)?),
            calibration_hash_id: HashId::new(row.get::<_, String>(1)?),
            run_tag: RunTag::new(row.get::<_, String>(2)?),
            created_at: Timestamp::from_unix_millis(row.get(3)?),
        })),
    }
}

/// Converts an `SQLite` `length()` result to a byte count.
fn byte_length(length: i64) -> u64 {
    u64::try_from(length).unwrap_or_default()
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let path_string = path.display().to_string();
    if path_string.is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(session: &mut StoreSession) -> Result<(), SqliteStoreError> {
    let tx = session.write()?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])?;
            tx.execute_batch(SCHEMA_SQL)?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit()?;
    Ok(())
}
