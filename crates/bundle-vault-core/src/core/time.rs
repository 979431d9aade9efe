// crates/bundle-vault-core/src/core/time.rs
// ============================================================================
// Module: Bundle Vault Time
// Description: Store-assigned creation timestamps.
// Purpose: Represent server clock readings and render them for the wire.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Timestamps are unix epoch milliseconds assigned by the store at commit
//! time, never by callers. They are rendered as RFC 3339 UTC strings with
//! millisecond precision in API responses.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;
use serde::Serializer;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Creation timestamp in unix epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Wraps a raw unix millisecond value.
    #[must_use]
    pub const fn from_unix_millis(value: i64) -> Self {
        Self(value)
    }

    /// Reads the current server clock.
    #[must_use]
    pub fn now() -> Self {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        Self(i64::try_from(now.as_millis()).unwrap_or(i64::MAX))
    }

    /// Returns the raw unix millisecond value.
    #[must_use]
    pub const fn unix_millis(self) -> i64 {
        self.0
    }

    /// Returns the later of this reading and `floor`.
    ///
    /// Stores use this to keep creation order monotonic with row ids even
    /// when the wall clock steps backwards.
    #[must_use]
    pub fn not_before(self, floor: Option<Self>) -> Self {
        floor.map_or(self, |floor| self.max(floor))
    }

    /// Renders the timestamp as RFC 3339 UTC.
    #[must_use]
    pub fn to_rfc3339(self) -> String {
        let nanos = i128::from(self.0) * 1_000_000;
        OffsetDateTime::from_unix_timestamp_nanos(nanos)
            .ok()
            .and_then(|value| value.format(&Rfc3339).ok())
            .unwrap_or_else(|| self.0.to_string())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_rfc3339())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
