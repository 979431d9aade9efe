// crates/bundle-vault-server/src/server.rs
// ============================================================================
// Module: Bundle Vault HTTP Server
// Description: axum routes for bundle upload, listing, and download.
// Purpose: Translate HTTP requests into ledger and selection engine calls.
// Dependencies: axum, base64, bundle-vault-core, bundle-vault-config, tokio
// ============================================================================

//! ## Overview
//! [`VaultServer`] owns the record ledger, selection engine, authorizer, and
//! audit sinks. Uploads arrive as multipart forms with one `archive` file
//! part; downloads and pointer updates take JSON bodies and downloads return
//! the stored blob base64-encoded in `data_b64`. Store calls run on the
//! blocking pool.
//!
//! ## Invariants
//! - Authorization runs before any store call and before a multipart body
//!   is streamed. JSON bodies are buffered (within the body limit) by the
//!   extractor first but are only parsed once the request is authorized.
//! - Error responses always use the `{status:"error", error}` envelope.
//! - List responses never include blobs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::ConnectInfo;
use axum::extract::DefaultBodyLimit;
use axum::extract::Multipart;
use axum::extract::Query;
use axum::extract::State;
use axum::extract::multipart::MultipartError;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::BytesRejection;
use axum::extract::rejection::QueryRejection;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::http::header::CONTENT_LENGTH;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bundle_vault_config::ServerAuditConfig;
use bundle_vault_config::StoreType;
use bundle_vault_config::VaultConfig;
use bundle_vault_core::BestRunPointer;
use bundle_vault_core::HashId;
use bundle_vault_core::InMemoryRecordStore;
use bundle_vault_core::ListLimit;
use bundle_vault_core::NewBestRun;
use bundle_vault_core::NewCalibration;
use bundle_vault_core::NewResult;
use bundle_vault_core::RecordId;
use bundle_vault_core::RecordLedger;
use bundle_vault_core::ResultName;
use bundle_vault_core::ResultQuery;
use bundle_vault_core::RunTag;
use bundle_vault_core::SelectionEngine;
use bundle_vault_core::SharedRecordStore;
use bundle_vault_core::Timestamp;
use bundle_vault_core::VaultError;
use bundle_vault_store_sqlite::SqliteRecordStore;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpListener;

use crate::audit::FileAuditSink;
use crate::audit::NoopAuditSink;
use crate::audit::StderrAuditSink;
use crate::audit::VaultAuditEvent;
use crate::audit::VaultAuditEventParams;
use crate::audit::VaultAuditSink;
use crate::auth::AuthAuditEvent;
use crate::auth::AuthAuditSink;
use crate::auth::BearerTokenAuthz;
use crate::auth::RequestAuthz;
use crate::auth::RequestContext;

// ============================================================================
// SECTION: Routes
// ============================================================================

/// Calibration upload route.
const ROUTE_CALIBRATIONS_UPLOAD: &str = "calibrations/upload";
/// Calibration listing route.
const ROUTE_CALIBRATIONS_LIST: &str = "calibrations/list";
/// Newest calibration metadata route.
const ROUTE_CALIBRATIONS_LATEST: &str = "calibrations/latest";
/// Calibration download route.
const ROUTE_CALIBRATIONS_DOWNLOAD: &str = "calibrations/download";
/// Result upload route.
const ROUTE_RESULTS_UPLOAD: &str = "results/upload";
/// Result listing route.
const ROUTE_RESULTS_LIST: &str = "results/list";
/// Result download route.
const ROUTE_RESULTS_DOWNLOAD: &str = "results/download";
/// Best-run pointer append route.
const ROUTE_BESTRUNS_SET: &str = "bestruns/set";
/// Newest best-run pointer route.
const ROUTE_BESTRUNS_GET: &str = "bestruns/get";
/// Best-run history route.
const ROUTE_BESTRUNS_LIST: &str = "bestruns/list";

/// Multipart part carrying the bundle bytes.
const ARCHIVE_PART: &str = "archive";
/// Stored filename when the archive part carries none.
const DEFAULT_ARCHIVE_FILENAME: &str = "archive.zip";

// ============================================================================
// SECTION: Vault Server
// ============================================================================

/// Bundle Vault HTTP server.
pub struct VaultServer {
    /// Address to bind in [`VaultServer::serve`].
    bind: SocketAddr,
    /// Maximum accepted request body size.
    max_body_bytes: usize,
    /// Shared handler state.
    state: Arc<AppState>,
}

impl VaultServer {
    /// Builds a server from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`VaultServerError`] when configuration is invalid or the store
    /// or audit log cannot be opened.
    pub fn from_config(config: VaultConfig) -> Result<Self, VaultServerError> {
        config.validate().map_err(|err| VaultServerError::Config(err.to_string()))?;
        let bind =
            config.server.bind_addr().map_err(|err| VaultServerError::Config(err.to_string()))?;
        let store = build_record_store(&config)?;
        let sinks = build_audit_sinks(&config.server.audit)?;
        let authz = BearerTokenAuthz::from_config(&config.server.auth);
        emit_open_access_warning(&authz, bind);
        let state = AppState {
            ledger: RecordLedger::new(store.clone()),
            engine: SelectionEngine::new(store),
            authz: Arc::new(authz),
            auth_audit: sinks.auth,
            audit: sinks.requests,
        };
        Ok(Self {
            bind,
            max_body_bytes: config.server.max_body_bytes,
            state: Arc::new(state),
        })
    }

    /// Returns the configured bind address.
    #[must_use]
    pub const fn bind_addr(&self) -> SocketAddr {
        self.bind
    }

    /// Returns the ledger backing this server.
    #[must_use]
    pub fn ledger(&self) -> &RecordLedger {
        &self.state.ledger
    }

    /// Builds the axum router with every vault route.
    #[must_use]
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(handle_health))
            .route("/calibrations/upload", post(handle_calibration_upload))
            .route("/calibrations/list", get(handle_calibration_list))
            .route("/calibrations/latest", get(handle_calibration_latest))
            .route("/calibrations/download", post(handle_calibration_download))
            .route("/results/upload", post(handle_result_upload))
            .route("/results/list", get(handle_result_list))
            .route("/results/download", post(handle_result_download))
            .route("/bestruns/set", post(handle_best_run_set))
            .route("/bestruns/get", get(handle_best_run_get))
            .route("/bestruns/list", get(handle_best_run_list))
            .layer(DefaultBodyLimit::max(self.max_body_bytes))
            .with_state(Arc::clone(&self.state))
    }

    /// Binds the configured address and serves requests until shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`VaultServerError::Transport`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), VaultServerError> {
        let listener = TcpListener::bind(self.bind)
            .await
            .map_err(|err| VaultServerError::Transport(format!("http bind failed: {err}")))?;
        self.serve_listener(listener).await
    }

    /// Serves requests on an already bound listener.
    ///
    /// # Errors
    ///
    /// Returns [`VaultServerError::Transport`] when the server fails.
    pub async fn serve_listener(self, listener: TcpListener) -> Result<(), VaultServerError> {
        let app = self.router();
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|err| VaultServerError::Transport(format!("http server failed: {err}")))
    }
}

/// Builds the record store named by configuration.
fn build_record_store(config: &VaultConfig) -> Result<SharedRecordStore, VaultServerError> {
    let store = match config.store.store_type {
        StoreType::Memory => SharedRecordStore::from_store(InMemoryRecordStore::new()),
        StoreType::Sqlite => {
            let store = SqliteRecordStore::new(config.store.sqlite_config())
                .map_err(|err| VaultServerError::Init(err.to_string()))?;
            SharedRecordStore::from_store(store)
        }
    };
    Ok(store)
}

/// Request and auth audit sinks built from configuration.
struct AuditSinks {
    /// Sink for request outcomes.
    requests: Arc<dyn VaultAuditSink>,
    /// Sink for authorization decisions.
    auth: Arc<dyn AuthAuditSink>,
}

/// Builds audit sinks; a configured path appends to a file, otherwise
/// events go to stderr.
fn build_audit_sinks(config: &ServerAuditConfig) -> Result<AuditSinks, VaultServerError> {
    if !config.enabled {
        let sink = Arc::new(NoopAuditSink);
        return Ok(AuditSinks {
            requests: Arc::clone(&sink) as Arc<dyn VaultAuditSink>,
            auth: sink,
        });
    }
    if let Some(path) = &config.path {
        let sink = Arc::new(FileAuditSink::new(Path::new(path)).map_err(|err| {
            VaultServerError::Init(format!("audit log open failed: {err}"))
        })?);
        return Ok(AuditSinks {
            requests: Arc::clone(&sink) as Arc<dyn VaultAuditSink>,
            auth: sink,
        });
    }
    let sink = Arc::new(StderrAuditSink);
    Ok(AuditSinks {
        requests: Arc::clone(&sink) as Arc<dyn VaultAuditSink>,
        auth: sink,
    })
}

/// Warns on stderr when data routes are reachable without a token.
fn emit_open_access_warning(authz: &BearerTokenAuthz, bind: SocketAddr) {
    if !authz.requires_token() {
        let _ = writeln!(
            std::io::stderr(),
            "bundle-vault: WARNING: no api token configured; {bind} accepts unauthenticated \
             requests"
        );
    }
}

// ============================================================================
// SECTION: Handler State
// ============================================================================

/// Shared state for all handlers.
struct AppState {
    /// Append and listing operations.
    ledger: RecordLedger,
    /// Newest-wins lookups.
    engine: SelectionEngine,
    /// Data route authorizer.
    authz: Arc<dyn RequestAuthz>,
    /// Authorization decision sink.
    auth_audit: Arc<dyn AuthAuditSink>,
    /// Request outcome sink.
    audit: Arc<dyn VaultAuditSink>,
}

/// Per-request metadata captured before the body is read.
struct RequestMeta {
    /// Route label.
    route: &'static str,
    /// Caller address.
    peer: SocketAddr,
    /// Raw `Authorization` header.
    auth_header: Option<String>,
    /// Declared body size.
    request_bytes: usize,
}

impl RequestMeta {
    /// Captures route, peer, and header metadata.
    fn new(route: &'static str, peer: SocketAddr, headers: &HeaderMap) -> Self {
        let auth_header =
            headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok()).map(str::to_string);
        let request_bytes = headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<usize>().ok())
            .unwrap_or(0);
        Self {
            route,
            peer,
            auth_header,
            request_bytes,
        }
    }
}

/// Successful handler output.
struct ApiReply {
    /// JSON response body.
    body: Value,
    /// Record created or returned, for auditing.
    record_id: Option<RecordId>,
}

impl ApiReply {
    /// Serializes a response body.
    fn new(body: &impl Serialize, record_id: Option<RecordId>) -> Result<Self, ApiError> {
        let body = serde_json::to_value(body).map_err(|err| ApiError::Internal(err.to_string()))?;
        Ok(Self {
            body,
            record_id,
        })
    }
}

impl AppState {
    /// Authorizes a data request and records the decision.
    fn authorize(&self, meta: &RequestMeta) -> Result<(), ApiError> {
        let ctx = RequestContext::http(meta.route, Some(meta.peer.ip()), meta.auth_header.clone());
        match self.authz.authorize(&ctx) {
            Ok(auth) => {
                self.auth_audit.record(&AuthAuditEvent::allowed(&ctx, &auth));
                Ok(())
            }
            Err(err) => {
                self.auth_audit.record(&AuthAuditEvent::denied(&ctx, &err));
                Err(ApiError::Unauthorized)
            }
        }
    }

    /// Converts a handler outcome into a response and audits it.
    fn finish(&self, meta: &RequestMeta, outcome: Result<ApiReply, ApiError>) -> Response {
        let (status, record_id, error_kind, response) = match outcome {
            Ok(reply) => {
                (StatusCode::OK, reply.record_id, None, Json(reply.body).into_response())
            }
            Err(err) => (err.status(), None, Some(err.kind()), err.into_response()),
        };
        self.audit.record(&VaultAuditEvent::new(VaultAuditEventParams {
            route: meta.route,
            peer_ip: Some(meta.peer.ip().to_string()),
            status: status.as_u16(),
            record_id: record_id.map(RecordId::get),
            error_kind,
            request_bytes: meta.request_bytes,
        }));
        response
    }
}

/// Runs a store job on the blocking pool.
async fn run_blocking<T, F>(state: &Arc<AppState>, job: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&AppState) -> Result<T, VaultError> + Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || job(&state))
        .await
        .map_err(|err| ApiError::Internal(format!("store task failed: {err}")))?
        .map_err(ApiError::from)
}

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Upload acknowledgement.
#[derive(Debug, Serialize)]
struct UploadResponse {
    /// Always `ok`.
    status: &'static str,
    /// Assigned row id.
    id: RecordId,
    /// Assigned creation time.
    created_at: Timestamp,
    /// Stored run tag (result uploads only).
    #[serde(skip_serializing_if = "Option::is_none")]
    run_id: Option<Option<RunTag>>,
}

/// Listing envelope.
#[derive(Debug, Serialize)]
struct ListResponse<T> {
    /// `ok` for best-run listings; omitted elsewhere.
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'static str>,
    /// Listed rows, newest first.
    items: Vec<T>,
}

/// Calibration listing row.
#[derive(Debug, Serialize)]
struct CalibrationItem {
    /// Row id.
    id: RecordId,
    /// Lineage key.
    #[serde(rename = "hashID")]
    hash_id: HashId,
    /// Free-form notes.
    notes: Option<String>,
    /// Creation time.
    created_at: Timestamp,
    /// Stored archive filename.
    filename: String,
    /// Blob size in bytes.
    size: u64,
}

/// Newest calibration summary.
#[derive(Debug, Serialize)]
struct LatestCalibrationResponse {
    /// Lineage key.
    #[serde(rename = "hashID")]
    hash_id: HashId,
    /// Free-form notes.
    notes: Option<String>,
    /// Creation time.
    created_at: Timestamp,
}

/// Calibration download body.
#[derive(Debug, Deserialize)]
struct CalibrationDownloadRequest {
    /// Lineage key.
    #[serde(rename = "hashID", default)]
    hash_id: String,
}

/// Calibration download payload.
#[derive(Debug, Serialize)]
struct CalibrationDownloadResponse {
    /// Free-form notes.
    notes: Option<String>,
    /// Stored archive filename.
    filename: String,
    /// Creation time.
    created_at: Timestamp,
    /// Base64-encoded archive bytes.
    data_b64: String,
}

/// Result listing query.
#[derive(Debug, Deserialize)]
struct ResultListQuery {
    /// Lineage key.
    #[serde(rename = "hashID", default)]
    hash_id: String,
}

/// Result listing row.
#[derive(Debug, Serialize)]
struct ResultItem {
    /// Result name.
    name: ResultName,
    /// Run tag, when one was stored.
    run_id: Option<RunTag>,
    /// Free-form notes.
    notes: Option<String>,
    /// Creation time.
    created_at: Timestamp,
}

/// Result download body.
#[derive(Debug, Deserialize)]
struct ResultDownloadRequest {
    /// Lineage key.
    #[serde(rename = "hashID", default)]
    hash_id: String,
    /// Result name.
    #[serde(default)]
    name: String,
    /// Optional run tag filter.
    #[serde(rename = "runID", default)]
    run_id: Option<String>,
}

/// Result download payload.
#[derive(Debug, Serialize)]
struct ResultDownloadResponse {
    /// Free-form notes.
    notes: Option<String>,
    /// Stored archive filename.
    filename: String,
    /// Creation time.
    created_at: Timestamp,
    /// Run tag, when one was stored.
    run_id: Option<RunTag>,
    /// Base64-encoded archive bytes.
    data_b64: String,
}

/// Best-run pointer append body.
#[derive(Debug, Deserialize)]
struct BestRunSetRequest {
    /// Lineage key the pointer refers to.
    #[serde(rename = "calibrationHashID", default)]
    calibration_hash_id: String,
    /// Run tag the pointer refers to.
    #[serde(rename = "runID", default)]
    run_id: String,
}

/// Best-run pointer row.
#[derive(Debug, Serialize)]
struct BestRunItem {
    /// Row id.
    id: RecordId,
    /// Lineage key.
    calibration_hash_id: HashId,
    /// Run tag.
    run_id: RunTag,
    /// Creation time.
    created_at: Timestamp,
}

impl From<BestRunPointer> for BestRunItem {
    fn from(pointer: BestRunPointer) -> Self {
        Self {
            id: pointer.id,
            calibration_hash_id: pointer.calibration_hash_id,
            run_id: pointer.run_tag,
            created_at: pointer.created_at,
        }
    }
}

/// Single best-run pointer response.
#[derive(Debug, Serialize)]
struct BestRunResponse {
    /// Always `ok`.
    status: &'static str,
    /// Pointer row.
    #[serde(flatten)]
    item: BestRunItem,
}

/// Best-run history query.
#[derive(Debug, Deserialize)]
struct BestRunListQuery {
    /// Raw limit; parsed as an integer.
    #[serde(default)]
    limit: Option<String>,
}

// ============================================================================
// SECTION: Health
// ============================================================================

/// Liveness check; never authorized or audited.
async fn handle_health() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================================
// SECTION: Calibration Handlers
// ============================================================================

/// `POST /calibrations/upload`.
async fn handle_calibration_upload(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let meta = RequestMeta::new(ROUTE_CALIBRATIONS_UPLOAD, peer, &headers);
    let outcome = match state.authorize(&meta) {
        Ok(()) => calibration_upload(&state, multipart).await,
        Err(err) => Err(err),
    };
    state.finish(&meta, outcome)
}

/// Packs the multipart form into a calibration row.
async fn calibration_upload(
    state: &Arc<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<ApiReply, ApiError> {
    let mut form = UploadForm::read(multipart).await?;
    let hash_id = form.take("hashID").unwrap_or_default();
    let notes = form.take("notes");
    let (filename, blob) = form.into_archive();
    let new = NewCalibration {
        hash_id: HashId::new(hash_id),
        notes,
        filename,
        blob,
    };
    let receipt = run_blocking(state, move |state| state.ledger.insert_calibration(new)).await?;
    ApiReply::new(
        &UploadResponse {
            status: "ok",
            id: receipt.id,
            created_at: receipt.created_at,
            run_id: None,
        },
        Some(receipt.id),
    )
}

/// `GET /calibrations/list`.
async fn handle_calibration_list(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let meta = RequestMeta::new(ROUTE_CALIBRATIONS_LIST, peer, &headers);
    let outcome = match state.authorize(&meta) {
        Ok(()) => calibration_list(&state).await,
        Err(err) => Err(err),
    };
    state.finish(&meta, outcome)
}

/// Lists calibration metadata newest first.
async fn calibration_list(state: &Arc<AppState>) -> Result<ApiReply, ApiError> {
    let rows = run_blocking(state, |state| state.ledger.list_calibrations()).await?;
    let items = rows
        .into_iter()
        .map(|meta| CalibrationItem {
            id: meta.id,
            hash_id: meta.hash_id,
            notes: meta.notes,
            created_at: meta.created_at,
            filename: meta.filename,
            size: meta.size,
        })
        .collect();
    ApiReply::new(
        &ListResponse {
            status: None,
            items,
        },
        None,
    )
}

/// `GET /calibrations/latest`.
async fn handle_calibration_latest(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let meta = RequestMeta::new(ROUTE_CALIBRATIONS_LATEST, peer, &headers);
    let outcome = match state.authorize(&meta) {
        Ok(()) => calibration_latest(&state).await,
        Err(err) => Err(err),
    };
    state.finish(&meta, outcome)
}

/// Returns the newest calibration across all lineages.
async fn calibration_latest(state: &Arc<AppState>) -> Result<ApiReply, ApiError> {
    let latest = run_blocking(state, |state| state.engine.latest_calibration()).await?;
    let meta = latest.ok_or_else(|| ApiError::NotFound("no calibrations found".to_string()))?;
    ApiReply::new(
        &LatestCalibrationResponse {
            hash_id: meta.hash_id,
            notes: meta.notes,
            created_at: meta.created_at,
        },
        Some(meta.id),
    )
}

/// `POST /calibrations/download`.
async fn handle_calibration_download(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let meta = RequestMeta::new(ROUTE_CALIBRATIONS_DOWNLOAD, peer, &headers);
    let outcome = match state.authorize(&meta) {
        Ok(()) => calibration_download(&state, body).await,
        Err(err) => Err(err),
    };
    state.finish(&meta, outcome)
}

/// Returns the newest calibration for a lineage with its blob.
async fn calibration_download(
    state: &Arc<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<ApiReply, ApiError> {
    let request: CalibrationDownloadRequest = parse_json_body(body)?;
    let hash_id = HashId::new(request.hash_id);
    let record =
        run_blocking(state, move |state| state.engine.latest_calibration_by_key(&hash_id))
            .await?
            .ok_or_else(|| ApiError::NotFound("calibration not found".to_string()))?;
    ApiReply::new(
        &CalibrationDownloadResponse {
            notes: record.meta.notes,
            filename: record.meta.filename,
            created_at: record.meta.created_at,
            data_b64: STANDARD.encode(&record.blob),
        },
        Some(record.meta.id),
    )
}

// ============================================================================
// SECTION: Result Handlers
// ============================================================================

/// `POST /results/upload`.
async fn handle_result_upload(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let meta = RequestMeta::new(ROUTE_RESULTS_UPLOAD, peer, &headers);
    let outcome = match state.authorize(&meta) {
        Ok(()) => result_upload(&state, multipart).await,
        Err(err) => Err(err),
    };
    state.finish(&meta, outcome)
}

/// Packs the multipart form into a result row.
async fn result_upload(
    state: &Arc<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<ApiReply, ApiError> {
    let mut form = UploadForm::read(multipart).await?;
    let hash_id = form.take("hashID").unwrap_or_default();
    let name = form.take("name").unwrap_or_default();
    let run_tag = form.take("runID").map(RunTag::new);
    let notes = form.take("notes");
    let (filename, blob) = form.into_archive();
    let new = NewResult {
        hash_id: HashId::new(hash_id),
        name: ResultName::new(name),
        run_tag,
        notes,
        filename,
        blob,
    };
    let receipt = run_blocking(state, move |state| state.ledger.insert_result(new)).await?;
    ApiReply::new(
        &UploadResponse {
            status: "ok",
            id: receipt.id,
            created_at: receipt.created_at,
            run_id: Some(receipt.run_tag),
        },
        Some(receipt.id),
    )
}

/// `GET /results/list`.
async fn handle_result_list(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    query: Result<Query<ResultListQuery>, QueryRejection>,
) -> Response {
    let meta = RequestMeta::new(ROUTE_RESULTS_LIST, peer, &headers);
    let outcome = match state.authorize(&meta) {
        Ok(()) => result_list(&state, query).await,
        Err(err) => Err(err),
    };
    state.finish(&meta, outcome)
}

/// Lists result metadata for one lineage newest first.
async fn result_list(
    state: &Arc<AppState>,
    query: Result<Query<ResultListQuery>, QueryRejection>,
) -> Result<ApiReply, ApiError> {
    let Query(query) = query.map_err(|err| ApiError::Validation(err.body_text()))?;
    let hash_id = HashId::new(query.hash_id);
    let rows = run_blocking(state, move |state| state.ledger.list_results(&hash_id)).await?;
    let items = rows
        .into_iter()
        .map(|meta| ResultItem {
            name: meta.name,
            run_id: meta.run_tag,
            notes: meta.notes,
            created_at: meta.created_at,
        })
        .collect();
    ApiReply::new(
        &ListResponse {
            status: None,
            items,
        },
        None,
    )
}

/// `POST /results/download`.
async fn handle_result_download(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let meta = RequestMeta::new(ROUTE_RESULTS_DOWNLOAD, peer, &headers);
    let outcome = match state.authorize(&meta) {
        Ok(()) => result_download(&state, body).await,
        Err(err) => Err(err),
    };
    state.finish(&meta, outcome)
}

/// Returns the newest matching result with its blob.
async fn result_download(
    state: &Arc<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<ApiReply, ApiError> {
    let request: ResultDownloadRequest = parse_json_body(body)?;
    let query = ResultQuery {
        hash_id: HashId::new(request.hash_id),
        name: ResultName::new(request.name),
        run_tag: request.run_id.filter(|run_id| !run_id.is_empty()).map(RunTag::new),
    };
    let record = run_blocking(state, move |state| state.engine.latest_result(&query))
        .await?
        .ok_or_else(|| ApiError::NotFound("result not found".to_string()))?;
    ApiReply::new(
        &ResultDownloadResponse {
            notes: record.meta.notes,
            filename: record.meta.filename,
            created_at: record.meta.created_at,
            run_id: record.meta.run_tag,
            data_b64: STANDARD.encode(&record.blob),
        },
        Some(record.meta.id),
    )
}

// ============================================================================
// SECTION: Best-Run Handlers
// ============================================================================

/// `POST /bestruns/set`.
async fn handle_best_run_set(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let meta = RequestMeta::new(ROUTE_BESTRUNS_SET, peer, &headers);
    let outcome = match state.authorize(&meta) {
        Ok(()) => best_run_set(&state, body).await,
        Err(err) => Err(err),
    };
    state.finish(&meta, outcome)
}

/// Appends a best-run pointer.
async fn best_run_set(
    state: &Arc<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<ApiReply, ApiError> {
    let request: BestRunSetRequest = parse_json_body(body)?;
    let new = NewBestRun {
        calibration_hash_id: HashId::new(request.calibration_hash_id),
        run_tag: RunTag::new(request.run_id),
    };
    let pointer = new.clone();
    let receipt =
        run_blocking(state, move |state| state.ledger.insert_best_run_pointer(new)).await?;
    ApiReply::new(
        &BestRunResponse {
            status: "ok",
            item: BestRunItem {
                id: receipt.id,
                calibration_hash_id: pointer.calibration_hash_id,
                run_id: pointer.run_tag,
                created_at: receipt.created_at,
            },
        },
        Some(receipt.id),
    )
}

/// `GET /bestruns/get`.
async fn handle_best_run_get(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let meta = RequestMeta::new(ROUTE_BESTRUNS_GET, peer, &headers);
    let outcome = match state.authorize(&meta) {
        Ok(()) => best_run_get(&state).await,
        Err(err) => Err(err),
    };
    state.finish(&meta, outcome)
}

/// Returns the globally newest best-run pointer.
async fn best_run_get(state: &Arc<AppState>) -> Result<ApiReply, ApiError> {
    let pointer = run_blocking(state, |state| state.engine.latest_best_run_pointer())
        .await?
        .ok_or_else(|| ApiError::NotFound("no best run set".to_string()))?;
    let id = pointer.id;
    ApiReply::new(
        &BestRunResponse {
            status: "ok",
            item: BestRunItem::from(pointer),
        },
        Some(id),
    )
}

/// `GET /bestruns/list`.
async fn handle_best_run_list(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    query: Result<Query<BestRunListQuery>, QueryRejection>,
) -> Response {
    let meta = RequestMeta::new(ROUTE_BESTRUNS_LIST, peer, &headers);
    let outcome = match state.authorize(&meta) {
        Ok(()) => best_run_list(&state, query).await,
        Err(err) => Err(err),
    };
    state.finish(&meta, outcome)
}

/// Lists the best-run pointer history newest first.
async fn best_run_list(
    state: &Arc<AppState>,
    query: Result<Query<BestRunListQuery>, QueryRejection>,
) -> Result<ApiReply, ApiError> {
    let Query(query) = query.map_err(|err| ApiError::Validation(err.body_text()))?;
    let limit = parse_limit(query.limit.as_deref())?;
    let rows = run_blocking(state, move |state| state.ledger.list_best_run_pointers(limit)).await?;
    ApiReply::new(
        &ListResponse {
            status: Some("ok"),
            items: rows.into_iter().map(BestRunItem::from).collect(),
        },
        None,
    )
}

// ============================================================================
// SECTION: Request Parsing
// ============================================================================

/// Text fields and the archive part of an upload form.
struct UploadForm {
    /// Text fields by name; later duplicates replace earlier ones.
    fields: BTreeMap<String, String>,
    /// Archive part filename.
    filename: Option<String>,
    /// Archive part bytes; empty when the part is missing.
    archive: Vec<u8>,
}

impl UploadForm {
    /// Drains a multipart body.
    async fn read(multipart: Result<Multipart, MultipartRejection>) -> Result<Self, ApiError> {
        let mut multipart = multipart
            .map_err(|err| rejection_error(err.status(), err.body_text()))?;
        let mut form = Self {
            fields: BTreeMap::new(),
            filename: None,
            archive: Vec::new(),
        };
        while let Some(field) = multipart.next_field().await.map_err(|err| multipart_error(&err))? {
            let name = field.name().unwrap_or_default().to_string();
            if name == ARCHIVE_PART {
                form.filename = field.file_name().map(str::to_string);
                form.archive = field.bytes().await.map_err(|err| multipart_error(&err))?.to_vec();
            } else {
                let text = field.text().await.map_err(|err| multipart_error(&err))?;
                form.fields.insert(name, text);
            }
        }
        Ok(form)
    }

    /// Removes a text field.
    fn take(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }

    /// Returns the stored filename and archive bytes.
    fn into_archive(self) -> (String, Vec<u8>) {
        let filename = self
            .filename
            .map(|name| name.rsplit(['/', '\\']).next().unwrap_or_default().to_string())
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ARCHIVE_FILENAME.to_string());
        (filename, self.archive)
    }
}

/// Parses a JSON request body.
fn parse_json_body<T: for<'de> Deserialize<'de>>(
    body: Result<Bytes, BytesRejection>,
) -> Result<T, ApiError> {
    let bytes = body.map_err(|err| rejection_error(err.status(), err.body_text()))?;
    serde_json::from_slice(&bytes)
        .map_err(|err| ApiError::Validation(format!("invalid json body: {err}")))
}

/// Parses the optional best-run listing limit.
fn parse_limit(raw: Option<&str>) -> Result<ListLimit, ApiError> {
    let requested = match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
        None => None,
        Some(raw) => Some(
            raw.parse::<i64>()
                .map_err(|_| ApiError::Validation("limit must be an integer".to_string()))?,
        ),
    };
    Ok(ListLimit::resolve(requested))
}

/// Maps a multipart stream error.
fn multipart_error(err: &MultipartError) -> ApiError {
    rejection_error(err.status(), err.body_text())
}

/// Maps an extractor rejection, keeping the oversize status.
fn rejection_error(status: StatusCode, message: String) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(message)
    } else {
        ApiError::Validation(message)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Request failures surfaced as HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A required field is missing or malformed.
    #[error("{0}")]
    Validation(String),
    /// No row matches the lookup.
    #[error("{0}")]
    NotFound(String),
    /// The caller is not authorized.
    #[error("Unauthorized")]
    Unauthorized,
    /// The request body exceeds the configured limit.
    #[error("{0}")]
    PayloadTooLarge(String),
    /// The record store failed.
    #[error("{0}")]
    Store(String),
    /// The server failed outside the store.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Returns the HTTP status for the error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the audit label for the error.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Unauthorized => "unauthorized",
            Self::PayloadTooLarge(_) => "payload_too_large",
            Self::Store(_) => "store",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<VaultError> for ApiError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::Validation(message) => Self::Validation(message),
            VaultError::Store(err) => Self::Store(err.to_string()),
        }
    }
}

/// Error response envelope.
#[derive(Debug, Serialize)]
struct ErrorBody {
    /// Always `error`.
    status: &'static str,
    /// Human-readable message.
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            status: "error",
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Server startup and transport errors.
#[derive(Debug, thiserror::Error)]
pub enum VaultServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
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

    use axum::http::StatusCode;
    use bundle_vault_core::ListLimit;

    use super::ApiError;
    use super::UploadForm;
    use super::parse_limit;
    use super::rejection_error;

    #[test]
    fn parse_limit_defaults_and_clamps() {
        assert_eq!(parse_limit(None).unwrap(), ListLimit::resolve(None));
        assert_eq!(parse_limit(Some("")).unwrap().get(), 10);
        assert_eq!(parse_limit(Some("0")).unwrap().get(), 1);
        assert_eq!(parse_limit(Some("-4")).unwrap().get(), 1);
        assert_eq!(parse_limit(Some("500")).unwrap().get(), 100);
        assert_eq!(parse_limit(Some(" 25 ")).unwrap().get(), 25);
    }

    #[test]
    fn parse_limit_rejects_non_integers() {
        assert!(matches!(parse_limit(Some("ten")), Err(ApiError::Validation(_))));
        assert!(matches!(parse_limit(Some("2.5")), Err(ApiError::Validation(_))));
    }

    #[test]
    fn rejection_error_keeps_payload_too_large() {
        let err = rejection_error(StatusCode::PAYLOAD_TOO_LARGE, "too big".to_string());
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let err = rejection_error(StatusCode::BAD_REQUEST, "bad".to_string());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn archive_filename_falls_back_and_strips_directories() {
        let form = UploadForm {
            fields: std::collections::BTreeMap::new(),
            filename: None,
            archive: vec![1],
        };
        assert_eq!(form.into_archive().0, "archive.zip");
        let form = UploadForm {
            fields: std::collections::BTreeMap::new(),
            filename: Some("C:\\tmp\\bundle.zip".to_string()),
            archive: vec![1],
        };
        assert_eq!(form.into_archive().0, "bundle.zip");
    }

    #[test]
    fn unauthorized_message_is_fixed() {
        assert_eq!(ApiError::Unauthorized.to_string(), "Unauthorized");
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    }
}
