// crates/bundle-vault-cli/src/i18n.rs
// ============================================================================
// Module: CLI Message Catalog
// Description: English message catalog and placeholder substitution.
// Purpose: Centralize user-facing strings for the Bundle Vault CLI.
// Dependencies: Standard library collections.
// ============================================================================

//! ## Overview
//! User-facing CLI strings live in one catalog keyed by dotted names. All
//! runtime output goes through the [`t!`](crate::t) macro.
//!
//! ## Invariants
//! - The catalog is initialized once and read-only thereafter.
//! - Missing keys fall back to the key itself.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::OnceLock;

// ============================================================================
// SECTION: Types
// ============================================================================

/// A formatted message argument captured by the [`macro@crate::t`] macro.
#[derive(Clone)]
pub struct MessageArg {
    /// Placeholder name used in message templates.
    pub key: &'static str,
    /// Value substituted for the placeholder.
    pub value: String,
}

impl MessageArg {
    /// Constructs a new [`MessageArg`].
    pub fn new(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Static catalog entries.
const CATALOG_ITEMS: &[(&str, &str)] = &[
    ("main.version", "bundle-vault {version}"),
    ("output.stream.stdout", "stdout"),
    ("output.stream.stderr", "stderr"),
    ("output.write_failed", "Failed to write to {stream}: {error}"),
    ("output.serialize_failed", "Failed to render response: {error}"),
    ("config.load_failed", "Failed to load config: {error}"),
    ("config.validate.ok", "Config valid."),
    ("serve.token.persist_failed", "Failed to save api token to {path}: {error}"),
    ("serve.token.persisted", "Saved api token to {path}."),
    ("serve.init_failed", "Failed to initialize server: {error}"),
    ("serve.listening", "bundle-vault listening on {bind}"),
    ("serve.failed", "Server failed: {error}"),
    ("client.profile.load_failed", "Failed to load client profile: {error}"),
    ("client.profile.save_failed", "Failed to save client profile to {path}: {error}"),
    ("client.profile.saved", "Client profile saved to {path} (server {url})."),
    ("client.init_failed", "Failed to create HTTP client: {error}"),
    ("client.request_failed", "Request failed: {error}"),
    ("download.saved", "Saved {count} file(s) to {dir}."),
    ("download.file", "  {path}"),
];

// ============================================================================
// SECTION: Translation
// ============================================================================

/// Translates `key` using the English catalog while substituting `args`.
#[must_use]
pub fn translate(key: &str, args: Vec<MessageArg>) -> String {
    let template = catalog().get(key).copied().unwrap_or(key);
    if args.is_empty() {
        return template.to_string();
    }

    let mut result = template.to_string();
    for arg in args {
        let placeholder = format!("{{{}}}", arg.key);
        result = result.replace(&placeholder, &arg.value);
    }
    result
}

/// Returns the static English catalog.
fn catalog() -> &'static HashMap<&'static str, &'static str> {
    static CATALOG: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();

    CATALOG.get_or_init(|| CATALOG_ITEMS.iter().copied().collect())
}

// ============================================================================
// SECTION: Macro
// ============================================================================

/// Formats a catalog message from a key and named arguments.
///
/// Named arguments are substituted into `{placeholder}` positions.
#[macro_export]
macro_rules! t {
    ($key:literal $(, $name:ident = $value:expr )* $(,)?) => {{
        let args = ::std::vec![
            $(
                $crate::i18n::MessageArg::new(stringify!($name), $value.to_string()),
            )*
        ];
        $crate::i18n::translate($key, args)
    }};
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions favor direct unwrap/expect for clarity."
    )]

    use super::CATALOG_ITEMS;
    use super::translate;

    #[test]
    fn substitutes_named_placeholders() {
        let message = crate::t!("download.saved", count = 2, dir = "out");
        assert_eq!(message, "Saved 2 file(s) to out.");
    }

    #[test]
    fn unknown_keys_fall_back_to_key() {
        assert_eq!(translate("missing.key", Vec::new()), "missing.key");
    }

    #[test]
    fn catalog_keys_are_unique() {
        let mut keys: Vec<&str> = CATALOG_ITEMS.iter().map(|(key, _)| *key).collect();
        keys.sort_unstable();
        let before = keys.len();
        keys.dedup();
        assert_eq!(before, keys.len());
    }
}
