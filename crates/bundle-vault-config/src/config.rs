// crates/bundle-vault-config/src/config.rs
// ============================================================================
// Module: Bundle Vault Configuration
// Description: Configuration loading and validation for the vault server.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: bundle-vault-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits,
//! then environment overrides are applied and the result is validated.
//! An explicitly named file must exist; when no path is given and the
//! default file is absent, built-in defaults are used.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use bundle_vault_store_sqlite::SqliteStoreConfig;
use bundle_vault_store_sqlite::SqliteStoreMode;
use bundle_vault_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "bundle-vault.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "BUNDLE_VAULT_CONFIG";
/// Environment variable overriding the bearer token.
pub const API_TOKEN_ENV_VAR: &str = "BUNDLE_VAULT_API_TOKEN";
/// Environment variable overriding the `SQLite` database path.
pub const DB_PATH_ENV_VAR: &str = "BUNDLE_VAULT_DB_PATH";
/// Environment variable overriding the request body limit.
pub const MAX_UPLOAD_BYTES_ENV_VAR: &str = "BUNDLE_VAULT_MAX_UPLOAD_BYTES";
/// Environment variable overriding the bind address.
pub const BIND_ENV_VAR: &str = "BUNDLE_VAULT_BIND";
/// Default bind address.
pub const DEFAULT_BIND: &str = "127.0.0.1:5050";
/// Default maximum request body size (500 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 500 * 1024 * 1024;
/// Default `SQLite` database filename.
pub const DEFAULT_DB_NAME: &str = "bundle-vault.db";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum length of a bearer token.
pub(crate) const MAX_AUTH_TOKEN_LENGTH: usize = 256;
/// Default `SQLite` busy timeout in milliseconds.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum `SQLite` busy timeout in milliseconds.
const MAX_BUSY_TIMEOUT_MS: u64 = 60_000;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading or writing configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Bundle Vault server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VaultConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Record store configuration.
    #[serde(default)]
    pub store: StoreConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Bearer token authentication.
    #[serde(default)]
    pub auth: ServerAuthConfig,
    /// Structured audit logging.
    #[serde(default)]
    pub audit: ServerAuditConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            auth: ServerAuthConfig::default(),
            audit: ServerAuditConfig::default(),
        }
    }
}

/// Bearer token authentication settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerAuthConfig {
    /// Shared bearer token; absent means requests are unauthenticated.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

/// Audit logging settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerAuditConfig {
    /// Enable structured audit logging.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Optional audit log path (JSON lines); stderr when absent.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for ServerAuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            path: None,
        }
    }
}

/// Record store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: StoreType,
    /// `SQLite` database path; defaults to [`DEFAULT_DB_NAME`].
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::default(),
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Record store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// In-memory store; contents vanish with the process.
    Memory,
    /// `SQLite`-backed durable store.
    #[default]
    Sqlite,
}

/// Environment overrides applied after the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    /// Bearer token override.
    pub api_token: Option<String>,
    /// `SQLite` database path override.
    pub db_path: Option<String>,
    /// Request body limit override, as text.
    pub max_upload_bytes: Option<String>,
    /// Bind address override.
    pub bind: Option<String>,
}

impl EnvOverrides {
    /// Reads overrides from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            api_token: env::var(API_TOKEN_ENV_VAR).ok(),
            db_path: env::var(DB_PATH_ENV_VAR).ok(),
            max_upload_bytes: env::var(MAX_UPLOAD_BYTES_ENV_VAR).ok(),
            bind: env::var(BIND_ENV_VAR).ok(),
        }
    }
}

// ============================================================================
// SECTION: Loading
// ============================================================================

impl VaultConfig {
    /// Loads configuration using the default resolution rules and process
    /// environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, &EnvOverrides::from_env())
    }

    /// Loads configuration and applies the given overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load_with(path: Option<&Path>, overrides: &EnvOverrides) -> Result<Self, ConfigError> {
        let (resolved, explicit) = resolve_path(path)?;
        validate_path(&resolved)?;
        let mut config = if !explicit && !resolved.exists() {
            Self::default()
        } else {
            let content = read_config_text(&resolved)?;
            toml::from_str(&content).map_err(|err| ConfigError::Parse(err.to_string()))?
        };
        config.apply_overrides(overrides)?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the config file path `load` would read: the explicit path,
    /// then the environment override, then [`DEFAULT_CONFIG_NAME`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the resolved path is unsafe.
    pub fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
        let (resolved, _) = resolve_path(path)?;
        validate_path(&resolved)?;
        Ok(resolved)
    }

    /// Applies environment overrides; empty values are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when an override cannot be parsed.
    pub fn apply_overrides(&mut self, overrides: &EnvOverrides) -> Result<(), ConfigError> {
        if let Some(token) = non_empty(overrides.api_token.as_deref()) {
            self.server.auth.bearer_token = Some(token.to_string());
        }
        if let Some(path) = non_empty(overrides.db_path.as_deref()) {
            self.store.store_type = StoreType::Sqlite;
            self.store.path = Some(PathBuf::from(path));
        }
        if let Some(bytes) = non_empty(overrides.max_upload_bytes.as_deref()) {
            self.server.max_body_bytes = bytes.parse().map_err(|_| {
                ConfigError::Invalid(format!("{MAX_UPLOAD_BYTES_ENV_VAR} must be an integer"))
            })?;
        }
        if let Some(bind) = non_empty(overrides.bind.as_deref()) {
            self.server.bind = bind.to_string();
        }
        Ok(())
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.store.validate()
    }
}

impl ServerConfig {
    /// Returns the parsed bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the address does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("invalid bind address: {}", self.bind)))
    }

    /// Validates server configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_body_bytes must be greater than zero".to_string(),
            ));
        }
        if let Some(token) = &self.auth.bearer_token {
            validate_token(token)?;
        }
        if let Some(path) = &self.audit.path {
            validate_path_string("server.audit.path", path)?;
        }
        Ok(())
    }
}

impl StoreConfig {
    /// Returns the effective `SQLite` database path.
    #[must_use]
    pub fn sqlite_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_DB_NAME))
    }

    /// Builds the `SQLite` store configuration.
    #[must_use]
    pub fn sqlite_config(&self) -> SqliteStoreConfig {
        SqliteStoreConfig {
            path: self.sqlite_path(),
            busy_timeout_ms: self.busy_timeout_ms,
            journal_mode: self.journal_mode,
            sync_mode: self.sync_mode,
        }
    }

    /// Validates record store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            StoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid("memory store must not set path".to_string()));
                }
                Ok(())
            }
            StoreType::Sqlite => {
                validate_path_string("store.path", &self.sqlite_path().to_string_lossy())?;
                if self.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
                    return Err(ConfigError::Invalid(format!(
                        "store.busy_timeout_ms must be at most {MAX_BUSY_TIMEOUT_MS}"
                    )));
                }
                Ok(())
            }
        }
    }
}

// ============================================================================
// SECTION: Token Persistence
// ============================================================================

/// Writes `token` into `server.auth.bearer_token` of the config file at
/// `path`, creating the file if absent and preserving every other key.
///
/// # Errors
///
/// Returns [`ConfigError`] when the token is invalid, the existing file
/// cannot be parsed, or the result fails validation or cannot be written.
pub fn persist_api_token(path: &Path, token: &str) -> Result<(), ConfigError> {
    validate_path(path)?;
    validate_token(token)?;
    let mut table: toml::Table = if path.exists() {
        toml::from_str(&read_config_text(path)?)
            .map_err(|err| ConfigError::Parse(err.to_string()))?
    } else {
        toml::Table::new()
    };
    let server = child_table(&mut table, "server")?;
    let auth = child_table(server, "auth")?;
    auth.insert("bearer_token".to_string(), toml::Value::String(token.to_string()));

    let rendered = toml::to_string(&table).map_err(|err| ConfigError::Invalid(err.to_string()))?;
    let parsed: VaultConfig =
        toml::from_str(&rendered).map_err(|err| ConfigError::Parse(err.to_string()))?;
    parsed.validate()?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| ConfigError::Io(err.to_string()))?;
    }
    fs::write(path, rendered).map_err(|err| ConfigError::Io(err.to_string()))
}

/// Returns the named sub-table, inserting an empty one when absent.
fn child_table<'a>(
    table: &'a mut toml::Table,
    key: &str,
) -> Result<&'a mut toml::Table, ConfigError> {
    let value = table.entry(key.to_string()).or_insert(toml::Value::Table(toml::Table::new()));
    match value {
        toml::Value::Table(child) => Ok(child),
        _ => Err(ConfigError::Invalid(format!("{key} must be a table"))),
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Returns the default bind address.
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Returns the default request body limit.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Audit logging is on unless disabled.
const fn default_audit_enabled() -> bool {
    true
}

/// Returns the default `SQLite` busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path; the flag is true when the path was named
/// explicitly (argument or environment) and therefore must exist.
fn resolve_path(path: Option<&Path>) -> Result<(PathBuf, bool), ConfigError> {
    if let Some(path) = path {
        return Ok((path.to_path_buf(), true));
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        if !env_path.trim().is_empty() {
            return Ok((PathBuf::from(env_path), true));
        }
    }
    Ok((PathBuf::from(DEFAULT_CONFIG_NAME), false))
}

/// Reads a config file as UTF-8 text within the size limit.
pub(crate) fn read_config_text(path: &Path) -> Result<String, ConfigError> {
    let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
    if bytes.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
    }
    String::from_utf8(bytes)
        .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))
}

/// Validates config file paths for safety limits.
pub(crate) fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path-valued config field.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a bearer token value.
pub(crate) fn validate_token(token: &str) -> Result<(), ConfigError> {
    if token.trim().is_empty() {
        return Err(ConfigError::Invalid("bearer_token must be non-empty".to_string()));
    }
    if token.len() > MAX_AUTH_TOKEN_LENGTH {
        return Err(ConfigError::Invalid(format!(
            "bearer_token exceeds {MAX_AUTH_TOKEN_LENGTH} bytes"
        )));
    }
    if token.chars().any(char::is_whitespace) {
        return Err(ConfigError::Invalid("bearer_token must not contain whitespace".to_string()));
    }
    Ok(())
}

/// Returns the trimmed value when present and non-empty.
fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
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

    use super::MAX_AUTH_TOKEN_LENGTH;
    use super::validate_path_string;
    use super::validate_token;

    #[test]
    fn validate_token_rejects_whitespace_and_overlong_values() {
        assert!(validate_token("abc123").is_ok());
        assert!(validate_token("   ").is_err());
        assert!(validate_token("has space").is_err());
        assert!(validate_token(&"a".repeat(MAX_AUTH_TOKEN_LENGTH + 1)).is_err());
    }

    #[test]
    fn validate_path_string_error_includes_field_name() {
        let err = validate_path_string("store.path", " ").unwrap_err();
        assert!(err.to_string().contains("store.path"));
        let long_component = "c".repeat(300);
        assert!(validate_path_string("store.path", &long_component).is_err());
    }
}
