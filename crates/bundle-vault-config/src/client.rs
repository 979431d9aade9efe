// crates/bundle-vault-config/src/client.rs
// ============================================================================
// Module: Bundle Vault Client Profile
// Description: Persisted server URL and token for CLI client commands.
// Purpose: Remember connection settings between client invocations.
// Dependencies: serde, toml
// ============================================================================

//! ## Overview
//! The client profile is a small TOML file holding the server URL and an
//! optional bearer token. Command-line flags override the stored values for
//! a single invocation without rewriting the file. A missing profile yields
//! the defaults.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::config::ConfigError;
use crate::config::read_config_text;
use crate::config::validate_path;
use crate::config::validate_token;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default client profile filename.
pub const DEFAULT_CLIENT_CONFIG_NAME: &str = ".bundle-vault-client.toml";
/// Environment variable used to override the client profile path.
pub const CLIENT_CONFIG_ENV_VAR: &str = "BUNDLE_VAULT_CLIENT_CONFIG";
/// Server URL used when no profile or flag names one.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5050";

// ============================================================================
// SECTION: Profile
// ============================================================================

/// Persisted client connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientProfile {
    /// Base URL of the vault server.
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Bearer token sent with every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
}

impl Default for ClientProfile {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            api_token: None,
        }
    }
}

impl ClientProfile {
    /// Resolves the profile path from an explicit path, the environment, or
    /// the default name.
    #[must_use]
    pub fn resolve_path(path: Option<&Path>) -> PathBuf {
        if let Some(path) = path {
            return path.to_path_buf();
        }
        match env::var(CLIENT_CONFIG_ENV_VAR) {
            Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
            _ => PathBuf::from(DEFAULT_CLIENT_CONFIG_NAME),
        }
    }

    /// Loads the profile at `path`; a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, parsed, or
    /// validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        validate_path(path)?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let profile: Self = toml::from_str(&read_config_text(path)?)
            .map_err(|err| ConfigError::Parse(err.to_string()))?;
        profile.validate()?;
        Ok(profile)
    }

    /// Writes the profile to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation or the write fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        validate_path(path)?;
        self.validate()?;
        let rendered =
            toml::to_string(self).map_err(|err| ConfigError::Invalid(err.to_string()))?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| ConfigError::Io(err.to_string()))?;
        }
        fs::write(path, rendered).map_err(|err| ConfigError::Io(err.to_string()))
    }

    /// Applies per-invocation overrides; the server URL loses any trailing
    /// slash.
    #[must_use]
    pub fn with_overrides(self, server_url: Option<String>, api_token: Option<String>) -> Self {
        let server_url = server_url.unwrap_or(self.server_url);
        Self {
            server_url: server_url.trim().trim_end_matches('/').to_string(),
            api_token: api_token.or(self.api_token),
        }
    }

    /// Validates the profile.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the URL lacks an http(s) scheme
    /// or the token is malformed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.server_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid(
                "server_url must include http:// or https://".to_string(),
            ));
        }
        if let Some(token) = &self.api_token {
            validate_token(token)?;
        }
        Ok(())
    }
}

/// Returns the default server URL.
fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}
