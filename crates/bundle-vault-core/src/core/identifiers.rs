// crates/bundle-vault-core/src/core/identifiers.rs
// ============================================================================
// Module: Bundle Vault Identifiers
// Description: Opaque identifiers and key values for stored bundles.
// Purpose: Provide strongly typed, serializable keys with stable string forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Keys are caller-supplied strings correlating records by equality; none of
//! them is unique on its own. Emptiness is rejected at the ledger boundary
//! rather than inside these wrappers. [`RecordId`] is the only store-assigned
//! identifier and is the final tie-break in newest-wins ordering.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Key Types
// ============================================================================

/// Defines a transparent string key with the shared constructor surface.
macro_rules! string_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new key from the provided value.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the key as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns true when the key is empty or whitespace only.
            #[must_use]
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }

            /// Returns the key with surrounding whitespace removed.
            #[must_use]
            pub fn trimmed(&self) -> Self {
                Self(self.0.trim().to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

string_key!(
    /// Calibration lineage key (`hashID` on the wire).
    HashId
);

string_key!(
    /// Result kind within a lineage (`name` on the wire).
    ResultName
);

string_key!(
    /// Free-form run label (`runID` / `run_id` on the wire).
    RunTag
);

// ============================================================================
// SECTION: Record Identifier
// ============================================================================

/// Store-assigned row identifier, strictly increasing per table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(i64);

impl RecordId {
    /// Wraps a raw row identifier.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw row identifier.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
