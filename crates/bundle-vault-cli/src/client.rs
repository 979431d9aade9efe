// crates/bundle-vault-cli/src/client.rs
// ============================================================================
// Module: Bundle Vault HTTP Client
// Description: Typed client for the vault server routes.
// Purpose: Pack files for upload and unpack downloaded bundles for the CLI.
// Dependencies: reqwest, base64, tokio, bundle-vault-core, bundle-vault-config
// ============================================================================

//! ## Overview
//! [`VaultClient`] wraps the vault HTTP routes. Uploads pack the given files
//! into one ZIP bundle before sending; downloads decode `data_b64` and unpack
//! the bundle under a destination directory. Non-success responses surface
//! the server's `error` message.
//!
//! Security posture: server responses are untrusted; bodies are read under a
//! hard size limit and bundle entries never escape the destination.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bundle_vault_config::ClientProfile;
use bundle_vault_core::ArchiveError;
use bundle_vault_core::archive::list_entries;
use bundle_vault_core::archive::pack_files;
use bundle_vault_core::archive::unpack;
use reqwest::Client;
use reqwest::RequestBuilder;
use reqwest::StatusCode;
use reqwest::Url;
use reqwest::multipart::Form;
use reqwest::multipart::Part;
use reqwest::redirect::Policy;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum response body size accepted by the client.
pub const MAX_RESPONSE_BYTES: usize = 1024 * 1024 * 1024;
/// Bundle filename sent with calibration uploads.
pub const CALIBRATION_BUNDLE_NAME: &str = "calibration_bundle.zip";
/// Bundle filename sent with result uploads.
pub const RESULTS_BUNDLE_NAME: &str = "results_bundle.zip";
/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Invalid client configuration.
    #[error("client config error: {0}")]
    Config(String),
    /// Packing or unpacking a bundle failed.
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    /// The request could not be sent or the response not read.
    #[error("transport error: {0}")]
    Transport(String),
    /// The server answered with a non-success status.
    #[error("http status {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Server-provided error message.
        message: String,
    },
    /// The response body was not the expected JSON.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// Response size exceeds the limit.
    #[error("response exceeds size limit ({actual} > {limit})")]
    ResponseTooLarge {
        /// Actual size in bytes.
        actual: usize,
        /// Maximum size in bytes.
        limit: usize,
    },
}

impl ClientError {
    /// Returns the HTTP status for [`ClientError::Http`].
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http {
                status, ..
            } => Some(*status),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// A downloaded and unpacked bundle.
#[derive(Debug, Clone)]
pub struct DownloadedBundle {
    /// Response metadata without the encoded blob.
    pub metadata: Value,
    /// Entry names read from the archive before unpacking.
    pub entries: Vec<String>,
    /// Files written under the destination directory.
    pub files: Vec<PathBuf>,
}

/// Result upload arguments.
#[derive(Debug, Clone, Copy)]
pub struct ResultUpload<'a> {
    /// Lineage key.
    pub hash_id: &'a str,
    /// Result name.
    pub name: &'a str,
    /// Optional run tag.
    pub run_id: Option<&'a str>,
    /// Optional notes.
    pub notes: Option<&'a str>,
}

/// HTTP client for one vault server.
pub struct VaultClient {
    /// Underlying HTTP client.
    client: Client,
    /// Server base URL without a trailing slash.
    base_url: String,
    /// Optional bearer token.
    api_token: Option<String>,
}

impl std::fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultClient")
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl VaultClient {
    /// Builds a client from a validated profile.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the profile is invalid or the HTTP client
    /// cannot be constructed.
    pub fn new(profile: &ClientProfile) -> Result<Self, ClientError> {
        profile.validate().map_err(|err| ClientError::Config(err.to_string()))?;
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .redirect(Policy::none())
            .build()
            .map_err(|err| ClientError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            base_url: profile.server_url.trim().trim_end_matches('/').to_string(),
            api_token: profile.api_token.clone(),
        })
    }

    /// Returns the server base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ------------------------------------------------------------------------
    // Calibrations
    // ------------------------------------------------------------------------

    /// Packs `files` and uploads them as a calibration bundle.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when packing or the request fails.
    pub async fn upload_calibration(
        &self,
        hash_id: &str,
        notes: Option<&str>,
        files: &[PathBuf],
    ) -> Result<Value, ClientError> {
        let blob = pack_blocking(files).await?;
        let mut form = Form::new().text("hashID", hash_id.to_string());
        if let Some(notes) = notes {
            form = form.text("notes", notes.to_string());
        }
        let form = form.part("archive", Part::bytes(blob).file_name(CALIBRATION_BUNDLE_NAME));
        send(self.post("/calibrations/upload")?.multipart(form)).await
    }

    /// Lists calibration metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request fails.
    pub async fn list_calibrations(&self) -> Result<Value, ClientError> {
        send(self.get("/calibrations/list", &[])?).await
    }

    /// Returns the newest calibration metadata, or `None` when none exist.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request fails for a reason other than
    /// an empty vault.
    pub async fn latest_calibration(&self) -> Result<Option<Value>, ClientError> {
        match send(self.get("/calibrations/latest", &[])?).await {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.status() == Some(StatusCode::NOT_FOUND.as_u16()) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Downloads the newest calibration for `hash_id` and unpacks it into
    /// `out`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request, decoding, or unpacking fails.
    pub async fn download_calibration(
        &self,
        hash_id: &str,
        out: &Path,
    ) -> Result<DownloadedBundle, ClientError> {
        self.download("/calibrations/download", &json!({ "hashID": hash_id }), out).await
    }

    // ------------------------------------------------------------------------
    // Results
    // ------------------------------------------------------------------------

    /// Packs `files` and uploads them as a result bundle.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when packing or the request fails.
    pub async fn upload_result(
        &self,
        upload: ResultUpload<'_>,
        files: &[PathBuf],
    ) -> Result<Value, ClientError> {
        let blob = pack_blocking(files).await?;
        let mut form = Form::new()
            .text("hashID", upload.hash_id.to_string())
            .text("name", upload.name.to_string());
        if let Some(run_id) = upload.run_id {
            form = form.text("runID", run_id.to_string());
        }
        if let Some(notes) = upload.notes {
            form = form.text("notes", notes.to_string());
        }
        let form = form.part("archive", Part::bytes(blob).file_name(RESULTS_BUNDLE_NAME));
        send(self.post("/results/upload")?.multipart(form)).await
    }

    /// Lists result metadata for a lineage.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request fails.
    pub async fn list_results(&self, hash_id: &str) -> Result<Value, ClientError> {
        send(self.get("/results/list", &[("hashID", hash_id)])?).await
    }

    /// Downloads the newest matching result and unpacks it into `out`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request, decoding, or unpacking fails.
    pub async fn download_result(
        &self,
        hash_id: &str,
        name: &str,
        run_id: Option<&str>,
        out: &Path,
    ) -> Result<DownloadedBundle, ClientError> {
        let mut body = json!({ "hashID": hash_id, "name": name });
        if let (Some(run_id), Some(object)) = (run_id, body.as_object_mut()) {
            object.insert("runID".to_string(), Value::String(run_id.to_string()));
        }
        self.download("/results/download", &body, out).await
    }

    // ------------------------------------------------------------------------
    // Best runs
    // ------------------------------------------------------------------------

    /// Appends a best-run pointer.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request fails.
    pub async fn set_best_run(
        &self,
        calibration_hash_id: &str,
        run_id: &str,
    ) -> Result<Value, ClientError> {
        let body = json!({ "calibrationHashID": calibration_hash_id, "runID": run_id });
        send(self.post("/bestruns/set")?.json(&body)).await
    }

    /// Returns the newest best-run pointer.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request fails or no pointer is set.
    pub async fn get_best_run(&self) -> Result<Value, ClientError> {
        send(self.get("/bestruns/get", &[])?).await
    }

    /// Lists best-run pointer history.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request fails.
    pub async fn list_best_runs(&self, limit: Option<i64>) -> Result<Value, ClientError> {
        let limit = limit.map(|limit| limit.to_string());
        let query: Vec<(&str, &str)> =
            limit.as_deref().map(|limit| vec![("limit", limit)]).unwrap_or_default();
        send(self.get("/bestruns/list", &query)?).await
    }

    // ------------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------------

    /// Sends a download request and unpacks the returned bundle.
    async fn download(
        &self,
        path: &str,
        body: &Value,
        out: &Path,
    ) -> Result<DownloadedBundle, ClientError> {
        let mut metadata = send(self.post(path)?.json(body)).await?;
        let encoded = metadata
            .as_object_mut()
            .and_then(|object| object.remove("data_b64"))
            .and_then(|value| value.as_str().map(str::to_string))
            .ok_or_else(|| ClientError::Protocol("response missing data_b64".to_string()))?;
        let blob = STANDARD
            .decode(encoded.as_bytes())
            .map_err(|err| ClientError::Protocol(format!("invalid data_b64: {err}")))?;
        let (entries, files) = unpack_blocking(blob, out).await?;
        Ok(DownloadedBundle {
            metadata,
            entries,
            files,
        })
    }

    /// Builds an authorized GET request with query parameters.
    fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<RequestBuilder, ClientError> {
        let mut url = self.url(path)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(self.authorize(self.client.get(url)))
    }

    /// Builds an authorized POST request.
    fn post(&self, path: &str) -> Result<RequestBuilder, ClientError> {
        Ok(self.authorize(self.client.post(self.url(path)?)))
    }

    /// Resolves a route against the base URL.
    fn url(&self, path: &str) -> Result<Url, ClientError> {
        Url::parse(&format!("{}{path}", self.base_url))
            .map_err(|err| ClientError::Config(format!("invalid server url: {err}")))
    }

    /// Attaches the bearer token when one is configured.
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Packs `files` on the blocking pool.
async fn pack_blocking(files: &[PathBuf]) -> Result<Vec<u8>, ClientError> {
    let files = files.to_vec();
    tokio::task::spawn_blocking(move || pack_files(&files))
        .await
        .map_err(|err| ClientError::Transport(format!("pack task failed: {err}")))?
        .map_err(ClientError::from)
}

/// Validates and unpacks a downloaded blob on the blocking pool, returning
/// the entry names and the written paths.
async fn unpack_blocking(
    blob: Vec<u8>,
    out: &Path,
) -> Result<(Vec<String>, Vec<PathBuf>), ClientError> {
    let out = out.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let entries = list_entries(&blob)?;
        let files = unpack(&blob, &out)?;
        Ok::<_, ArchiveError>((entries, files))
    })
    .await
    .map_err(|err| ClientError::Transport(format!("unpack task failed: {err}")))?
    .map_err(ClientError::from)
}

/// Sends a request and decodes a JSON success body.
async fn send(request: RequestBuilder) -> Result<Value, ClientError> {
    let response =
        request.send().await.map_err(|err| ClientError::Transport(err.to_string()))?;
    let status = response.status();
    let body = read_response_body_with_limit(response, MAX_RESPONSE_BYTES).await?;
    if !status.is_success() {
        return Err(ClientError::Http {
            status: status.as_u16(),
            message: error_message(&body),
        });
    }
    serde_json::from_slice(&body)
        .map_err(|err| ClientError::Protocol(format!("invalid json response: {err}")))
}

/// Reads a response body while enforcing a hard byte limit.
async fn read_response_body_with_limit(
    mut response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, ClientError> {
    let mut body = Vec::new();
    let mut total: usize = 0;
    while let Some(chunk) =
        response.chunk().await.map_err(|err| ClientError::Transport(err.to_string()))?
    {
        let next_total = total.checked_add(chunk.len()).ok_or(ClientError::ResponseTooLarge {
            actual: usize::MAX,
            limit,
        })?;
        if next_total > limit {
            return Err(ClientError::ResponseTooLarge {
                actual: next_total,
                limit,
            });
        }
        body.extend_from_slice(&chunk);
        total = next_total;
    }
    Ok(body)
}

/// Extracts the `error` field of an error envelope, falling back to the raw
/// body text.
fn error_message(body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| value.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
