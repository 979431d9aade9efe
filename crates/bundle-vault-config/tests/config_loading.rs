// crates/bundle-vault-config/tests/config_loading.rs
// =============================================================================
// Module: Config Loading Tests
// Description: Validate defaults, file loading, overrides, and validation.
// Purpose: Ensure minimal config is valid and invalid input fails closed.
// =============================================================================

//! Config loading and validation tests for bundle-vault-config.

use std::fs;

use bundle_vault_config::ConfigError;
use bundle_vault_config::DEFAULT_MAX_BODY_BYTES;
use bundle_vault_config::EnvOverrides;
use bundle_vault_config::StoreType;
use bundle_vault_config::VaultConfig;
use bundle_vault_config::persist_api_token;
use bundle_vault_store_sqlite::SqliteStoreMode;
use tempfile::TempDir;

type TestResult = Result<(), String>;

fn parse(toml_str: &str) -> Result<VaultConfig, String> {
    toml::from_str(toml_str).map_err(|err| err.to_string())
}

fn assert_invalid(result: Result<(), ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(()) => Err("expected invalid config".to_string()),
    }
}

#[test]
fn empty_config_uses_defaults() -> TestResult {
    let config = parse("")?;
    config.validate().map_err(|err| err.to_string())?;
    if config.server.bind != "127.0.0.1:5050" {
        return Err(format!("unexpected bind {}", config.server.bind));
    }
    if config.server.max_body_bytes != DEFAULT_MAX_BODY_BYTES {
        return Err("unexpected default body limit".to_string());
    }
    if config.server.auth.bearer_token.is_some() {
        return Err("token should default to absent".to_string());
    }
    if !config.server.audit.enabled {
        return Err("audit should default to enabled".to_string());
    }
    if config.store.store_type != StoreType::Sqlite {
        return Err("store should default to sqlite".to_string());
    }
    if config.store.sqlite_path().to_string_lossy() != "bundle-vault.db" {
        return Err("unexpected default db path".to_string());
    }
    Ok(())
}

#[test]
fn full_config_parses() -> TestResult {
    let config = parse(
        r#"
        [server]
        bind = "0.0.0.0:8080"
        max_body_bytes = 1024
        [server.auth]
        bearer_token = "secret"
        [server.audit]
        enabled = false
        path = "audit.log"
        [store]
        type = "sqlite"
        path = "data/vault.db"
        busy_timeout_ms = 250
        journal_mode = "delete"
        sync_mode = "normal"
        "#,
    )?;
    config.validate().map_err(|err| err.to_string())?;
    let sqlite = config.store.sqlite_config();
    if sqlite.journal_mode != SqliteStoreMode::Delete || sqlite.busy_timeout_ms != 250 {
        return Err("sqlite settings not carried".to_string());
    }
    if config.server.auth.bearer_token.as_deref() != Some("secret") {
        return Err("token not parsed".to_string());
    }
    Ok(())
}

#[test]
fn invalid_values_fail_closed() -> TestResult {
    let mut config = parse("")?;
    config.server.bind = "not-an-address".to_string();
    assert_invalid(config.validate(), "invalid bind address")?;

    let mut config = parse("")?;
    config.server.max_body_bytes = 0;
    assert_invalid(config.validate(), "max_body_bytes must be greater than zero")?;

    let mut config = parse("")?;
    config.server.auth.bearer_token = Some("with space".to_string());
    assert_invalid(config.validate(), "whitespace")?;

    let mut config = parse("[store]\ntype = \"memory\"")?;
    config.validate().map_err(|err| err.to_string())?;
    config.store.path = Some("vault.db".into());
    assert_invalid(config.validate(), "memory store must not set path")
}

#[test]
fn unknown_store_type_is_a_parse_error() -> TestResult {
    match parse("[store]\ntype = \"postgres\"") {
        Err(_) => Ok(()),
        Ok(_) => Err("expected parse failure".to_string()),
    }
}

#[test]
fn overrides_replace_file_values() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("bundle-vault.toml");
    fs::write(&path, "[store]\ntype = \"memory\"\n[server]\nbind = \"127.0.0.1:6000\"\n")
        .map_err(|err| err.to_string())?;
    let overrides = EnvOverrides {
        api_token: Some("env-token".to_string()),
        db_path: Some(dir.path().join("env.db").to_string_lossy().into_owned()),
        max_upload_bytes: Some("2048".to_string()),
        bind: Some(String::new()),
    };
    let config = VaultConfig::load_with(Some(&path), &overrides).map_err(|err| err.to_string())?;
    if config.server.auth.bearer_token.as_deref() != Some("env-token") {
        return Err("token override not applied".to_string());
    }
    if config.store.store_type != StoreType::Sqlite {
        return Err("db path override should select sqlite".to_string());
    }
    if config.server.max_body_bytes != 2048 {
        return Err("body limit override not applied".to_string());
    }
    if config.server.bind != "127.0.0.1:6000" {
        return Err("empty bind override must be ignored".to_string());
    }
    Ok(())
}

#[test]
fn non_integer_upload_override_is_rejected() -> TestResult {
    let mut config = parse("")?;
    let overrides = EnvOverrides {
        max_upload_bytes: Some("lots".to_string()),
        ..EnvOverrides::default()
    };
    assert_invalid(config.apply_overrides(&overrides), "BUNDLE_VAULT_MAX_UPLOAD_BYTES")
}

#[test]
fn explicit_missing_file_is_an_io_error() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let missing = dir.path().join("absent.toml");
    match VaultConfig::load_with(Some(&missing), &EnvOverrides::default()) {
        Err(ConfigError::Io(_)) => Ok(()),
        other => Err(format!("expected io error, got {other:?}")),
    }
}

#[test]
fn persist_api_token_preserves_other_keys() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("bundle-vault.toml");
    fs::write(&path, "[server]\nbind = \"127.0.0.1:7000\"\n[store]\ntype = \"memory\"\n")
        .map_err(|err| err.to_string())?;
    persist_api_token(&path, "fresh-token").map_err(|err| err.to_string())?;
    let config = VaultConfig::load_with(Some(&path), &EnvOverrides::default())
        .map_err(|err| err.to_string())?;
    if config.server.auth.bearer_token.as_deref() != Some("fresh-token") {
        return Err("token not persisted".to_string());
    }
    if config.server.bind != "127.0.0.1:7000" || config.store.store_type != StoreType::Memory {
        return Err("existing keys were lost".to_string());
    }
    Ok(())
}

#[test]
fn persist_api_token_creates_missing_file() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("nested").join("bundle-vault.toml");
    persist_api_token(&path, "new-token").map_err(|err| err.to_string())?;
    let config = VaultConfig::load_with(Some(&path), &EnvOverrides::default())
        .map_err(|err| err.to_string())?;
    if config.server.auth.bearer_token.as_deref() != Some("new-token") {
        return Err("token not written".to_string());
    }
    assert_invalid(persist_api_token(&path, " "), "bearer_token must be non-empty")
}

#[test]
fn resolve_path_prefers_explicit_path() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("custom.toml");
    let resolved = VaultConfig::resolve_path(Some(&path)).map_err(|err| err.to_string())?;
    if resolved != path {
        return Err(format!("expected {}, got {}", path.display(), resolved.display()));
    }
    Ok(())
}
