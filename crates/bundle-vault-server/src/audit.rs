// crates/bundle-vault-server/src/audit.rs
// ============================================================================
// Module: Bundle Vault Audit Logging
// Description: Structured audit events for vault requests.
// Purpose: Emit JSON-line records for every routed request and auth decision.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Request outcomes are recorded as [`VaultAuditEvent`] JSON lines. The same
//! sinks also receive [`AuthAuditEvent`] records so one log carries both
//! streams. Payload contents are never logged; only sizes and record ids.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::auth::AuthAuditEvent;
use crate::auth::AuthAuditSink;

// ============================================================================
// SECTION: Audit Events
// ============================================================================

/// Audit payload for one handled request.
#[derive(Debug, Clone, Serialize)]
pub struct VaultAuditEvent {
    /// Event identifier.
    event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    timestamp_ms: u128,
    /// Route label.
    route: &'static str,
    /// Caller IP address (if available).
    peer_ip: Option<String>,
    /// Request outcome (`ok` or `error`).
    outcome: &'static str,
    /// HTTP status code returned.
    status: u16,
    /// Record id created or returned, when one applies.
    record_id: Option<i64>,
    /// Error kind label (if any).
    error_kind: Option<&'static str>,
    /// Declared request body size in bytes.
    request_bytes: usize,
}

/// Inputs for building a [`VaultAuditEvent`].
pub struct VaultAuditEventParams {
    /// Route label.
    pub route: &'static str,
    /// Caller IP address (if available).
    pub peer_ip: Option<String>,
    /// HTTP status code returned.
    pub status: u16,
    /// Record id created or returned.
    pub record_id: Option<i64>,
    /// Error kind label (if any).
    pub error_kind: Option<&'static str>,
    /// Declared request body size in bytes.
    pub request_bytes: usize,
}

impl VaultAuditEvent {
    /// Creates a new audit event stamped with the current time.
    #[must_use]
    pub fn new(params: VaultAuditEventParams) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |duration| duration.as_millis());
        Self {
            event: "vault_request",
            timestamp_ms,
            route: params.route,
            peer_ip: params.peer_ip,
            outcome: if params.error_kind.is_some() { "error" } else { "ok" },
            status: params.status,
            record_id: params.record_id,
            error_kind: params.error_kind,
            request_bytes: params.request_bytes,
        }
    }

    /// Returns the route label.
    #[must_use]
    pub const fn route(&self) -> &'static str {
        self.route
    }

    /// Returns the HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Returns the error kind label, if any.
    #[must_use]
    pub const fn error_kind(&self) -> Option<&'static str> {
        self.error_kind
    }
}

// ============================================================================
// SECTION: Audit Sinks
// ============================================================================

/// Audit sink for request events.
pub trait VaultAuditSink: Send + Sync {
    /// Records a request event.
    fn record(&self, event: &VaultAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl VaultAuditSink for StderrAuditSink {
    fn record(&self, event: &VaultAuditEvent) {
        write_stderr_line(event);
    }
}

impl AuthAuditSink for StderrAuditSink {
    fn record(&self, event: &AuthAuditEvent) {
        write_stderr_line(event);
    }
}

/// Audit sink that appends JSON lines to a file.
pub struct FileAuditSink {
    /// File handle guarded for concurrent writes.
    file: Mutex<File>,
}

impl FileAuditSink {
    /// Opens a file-backed audit sink, creating the file when absent.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be opened.
    pub fn new(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Serializes one record and appends it as a line.
    fn append(&self, event: &impl Serialize) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl VaultAuditSink for FileAuditSink {
    fn record(&self, event: &VaultAuditEvent) {
        self.append(event);
    }
}

impl AuthAuditSink for FileAuditSink {
    fn record(&self, event: &AuthAuditEvent) {
        self.append(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl VaultAuditSink for NoopAuditSink {
    fn record(&self, _event: &VaultAuditEvent) {}
}

impl AuthAuditSink for NoopAuditSink {
    fn record(&self, _event: &AuthAuditEvent) {}
}

/// Writes one serialized record to stderr.
fn write_stderr_line(event: &impl Serialize) {
    if let Ok(payload) = serde_json::to_string(event) {
        let _ = writeln!(std::io::stderr(), "{payload}");
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
