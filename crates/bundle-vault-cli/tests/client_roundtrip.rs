// crates/bundle-vault-cli/tests/client_roundtrip.rs
// ============================================================================
// Module: Client Roundtrip Tests
// Description: Drives VaultClient against an in-process vault server.
// Purpose: Validate packing on upload, unpacking on download, and auth errors.
// Dependencies: bundle-vault-cli, bundle-vault-core, bundle-vault-server, tempfile, tokio
// ============================================================================

//! Client tests against an in-memory vault on an ephemeral listener.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions use unwrap for clarity."
)]

use std::fs;
use std::path::PathBuf;

use bundle_vault_cli::client::ClientError;
use bundle_vault_cli::client::ResultUpload;
use bundle_vault_cli::client::VaultClient;
use bundle_vault_config::ClientProfile;
use bundle_vault_config::StoreType;
use bundle_vault_config::VaultConfig;
use bundle_vault_core::ArchiveError;
use bundle_vault_server::VaultServer;
use tempfile::TempDir;
use tokio::net::TcpListener;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Starts an in-memory vault and returns its base URL.
async fn start_vault(token: Option<&str>) -> String {
    let mut config = VaultConfig::default();
    config.store.store_type = StoreType::Memory;
    config.server.bind = "127.0.0.1:0".to_string();
    config.server.auth.bearer_token = token.map(str::to_string);
    config.server.audit.enabled = false;
    let server = VaultServer::from_config(config).expect("server");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(server.serve_listener(listener));
    format!("http://{addr}")
}

fn client_for(base: &str, token: Option<&str>) -> VaultClient {
    let profile = ClientProfile {
        server_url: base.to_string(),
        api_token: token.map(str::to_string),
    };
    VaultClient::new(&profile).expect("client")
}

fn write_files(dir: &TempDir, files: &[(&str, &[u8])]) -> Vec<PathBuf> {
    files
        .iter()
        .map(|(name, bytes)| {
            let path = dir.path().join(name);
            fs::write(&path, bytes).expect("write fixture");
            path
        })
        .collect()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[tokio::test]
async fn calibration_upload_then_download_restores_files() {
    let base = start_vault(None).await;
    let client = client_for(&base, None);
    let source = TempDir::new().unwrap();
    let files = write_files(&source, &[("gains.csv", b"1,2,3\n"), ("notes.txt", b"bench A")]);

    let receipt = client.upload_calibration("H1", Some("first pass"), &files).await.unwrap();
    assert_eq!(receipt["status"], "ok");

    let out = TempDir::new().unwrap();
    let bundle = client.download_calibration("H1", out.path()).await.unwrap();
    assert_eq!(bundle.metadata["filename"], "calibration_bundle.zip");
    assert_eq!(bundle.metadata["notes"], "first pass");
    assert!(bundle.metadata.get("data_b64").is_none());
    let mut entries = bundle.entries.clone();
    entries.sort();
    assert_eq!(entries, vec!["gains.csv".to_string(), "notes.txt".to_string()]);
    assert_eq!(bundle.files.len(), 2);
    assert_eq!(fs::read(out.path().join("gains.csv")).unwrap(), b"1,2,3\n");
    assert_eq!(fs::read(out.path().join("notes.txt")).unwrap(), b"bench A");
}

#[tokio::test]
async fn latest_calibration_is_none_on_empty_vault() {
    let base = start_vault(None).await;
    let client = client_for(&base, None);
    assert!(client.latest_calibration().await.unwrap().is_none());

    let source = TempDir::new().unwrap();
    let files = write_files(&source, &[("a.bin", b"a")]);
    client.upload_calibration("H1", None, &files).await.unwrap();
    let latest = client.latest_calibration().await.unwrap().expect("latest");
    assert_eq!(latest["hashID"], "H1");
}

#[tokio::test]
async fn result_upload_then_download_by_run_tag() {
    let base = start_vault(None).await;
    let client = client_for(&base, None);
    let source = TempDir::new().unwrap();
    let files = write_files(&source, &[("metrics.json", b"{\"loss\":0.1}")]);
    let upload = ResultUpload {
        hash_id: "H1",
        name: "metrics",
        run_id: Some("run-7"),
        notes: None,
    };
    let receipt = client.upload_result(upload, &files).await.unwrap();
    assert_eq!(receipt["run_id"], "run-7");

    let listed = client.list_results("H1").await.unwrap();
    assert_eq!(listed["items"].as_array().map(Vec::len), Some(1));

    let out = TempDir::new().unwrap();
    let bundle = client.download_result("H1", "metrics", Some("run-7"), out.path()).await.unwrap();
    assert_eq!(bundle.files.len(), 1);
    assert_eq!(fs::read(out.path().join("metrics.json")).unwrap(), b"{\"loss\":0.1}");

    let missing = client.download_result("H1", "metrics", Some("run-9"), out.path()).await;
    assert_eq!(missing.unwrap_err().status(), Some(404));
}

#[tokio::test]
async fn wrong_token_reports_unauthorized() {
    let base = start_vault(Some("secret")).await;
    let client = client_for(&base, Some("wrong"));
    let err = client.list_calibrations().await.unwrap_err();
    match err {
        ClientError::Http {
            status,
            message,
        } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Unauthorized");
        }
        other => panic!("unexpected error: {other}"),
    }

    let authorized = client_for(&base, Some("secret"));
    assert!(authorized.list_calibrations().await.is_ok());
}

#[tokio::test]
async fn best_run_history_honors_limit() {
    let base = start_vault(None).await;
    let client = client_for(&base, None);
    for run in 0 .. 4 {
        client.set_best_run("H1", &format!("run-{run}")).await.unwrap();
    }
    let latest = client.get_best_run().await.unwrap();
    assert_eq!(latest["run_id"], "run-3");

    let history = client.list_best_runs(Some(2)).await.unwrap();
    let items = history["items"].as_array().expect("items");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["run_id"], "run-3");
    assert_eq!(items[1]["run_id"], "run-2");
}

#[tokio::test]
async fn upload_of_missing_file_fails_before_sending() {
    let base = start_vault(None).await;
    let client = client_for(&base, None);
    let err = client
        .upload_calibration("H1", None, &[PathBuf::from("/nonexistent/bundle-vault/file")])
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Archive(_)));
    assert!(client.list_calibrations().await.unwrap()["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn files_sharing_a_name_are_rejected_before_sending() {
    let base = start_vault(None).await;
    let client = client_for(&base, None);
    let left = TempDir::new().unwrap();
    let right = TempDir::new().unwrap();
    let mut files = write_files(&left, &[("gains.csv", b"1")]);
    files.extend(write_files(&right, &[("gains.csv", b"2")]));

    let err = client.upload_calibration("H1", None, &files).await.unwrap_err();
    match err {
        ClientError::Archive(ArchiveError::DuplicateEntry(name)) => assert_eq!(name, "gains.csv"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(client.list_calibrations().await.unwrap()["items"].as_array().unwrap().is_empty());
}
