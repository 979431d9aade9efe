// crates/bundle-vault-cli/src/main.rs
// ============================================================================
// Module: Bundle Vault CLI Entry Point
// Description: Command dispatcher for the vault server and its HTTP client.
// Purpose: Run the server and drive uploads, listings and downloads.
// Dependencies: clap, bundle-vault-config, bundle-vault-server, serde_json, thiserror, tokio.
// ============================================================================

//! ## Overview
//! The `bundle-vault` binary starts the vault server (`serve`), validates
//! server configuration, manages the client profile, and wraps every vault
//! route as a subcommand. Client subcommands read the saved profile and
//! accept `--server` and `--api-token` overrides for a single invocation.
//! All user-facing strings are routed through the message catalog.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use bundle_vault_cli::client::DownloadedBundle;
use bundle_vault_cli::client::ResultUpload;
use bundle_vault_cli::client::VaultClient;
use bundle_vault_cli::t;
use bundle_vault_config::ClientProfile;
use bundle_vault_config::VaultConfig;
use bundle_vault_config::persist_api_token;
use bundle_vault_server::VaultServer;
use bundle_vault_server::VaultServerError;
use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "bundle-vault", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Server URL overriding the client profile.
    #[arg(long, value_name = "URL", global = true)]
    server: Option<String>,
    /// API token overriding the client profile (persisted by `serve` and
    /// `client set-server`).
    #[arg(long, value_name = "TOKEN", global = true)]
    api_token: Option<String>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the vault HTTP server.
    Serve(ServeCommand),
    /// Server configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Client profile utilities.
    Client {
        /// Selected client subcommand.
        #[command(subcommand)]
        command: ClientCommand,
    },
    /// Calibration bundle operations.
    Calibrations {
        /// Selected calibrations subcommand.
        #[command(subcommand)]
        command: CalibrationsCommand,
    },
    /// Result bundle operations.
    Results {
        /// Selected results subcommand.
        #[command(subcommand)]
        command: ResultsCommand,
    },
    /// Best-run pointer operations.
    Bestruns {
        /// Selected best-run subcommand.
        #[command(subcommand)]
        command: BestRunsCommand,
    },
}

/// Arguments for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Config file path (defaults to bundle-vault.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a server config file.
    Validate {
        /// Config file path (defaults to bundle-vault.toml or env override).
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

/// Client profile subcommands.
#[derive(Subcommand, Debug)]
enum ClientCommand {
    /// Save the server URL (and optional token) to the client profile.
    SetServer {
        /// Server base URL.
        #[arg(long, value_name = "URL")]
        url: String,
    },
}

/// Calibration subcommands.
#[derive(Subcommand, Debug)]
enum CalibrationsCommand {
    /// Pack files and upload them as a calibration bundle.
    Upload {
        /// Calibration hash id.
        #[arg(long, value_name = "ID")]
        hash_id: String,
        /// Free-form notes.
        #[arg(long)]
        notes: Option<String>,
        /// Files to pack.
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },
    /// List calibration metadata.
    List,
    /// Show the newest calibration.
    Latest,
    /// Download and unpack the newest calibration for a hash id.
    Download {
        /// Calibration hash id.
        #[arg(long, value_name = "ID")]
        hash_id: String,
        /// Output directory.
        #[arg(long, value_name = "DIR")]
        out: PathBuf,
    },
}

/// Result subcommands.
#[derive(Subcommand, Debug)]
enum ResultsCommand {
    /// Pack files and upload them as a result bundle.
    Upload(ResultUploadArgs),
    /// List result metadata for a calibration hash id.
    List {
        /// Calibration hash id.
        #[arg(long, value_name = "ID")]
        hash_id: String,
    },
    /// Download and unpack the newest matching result.
    Download {
        /// Calibration hash id.
        #[arg(long, value_name = "ID")]
        hash_id: String,
        /// Result name.
        #[arg(long)]
        name: String,
        /// Optional run tag.
        #[arg(long, value_name = "RUN")]
        run_id: Option<String>,
        /// Output directory.
        #[arg(long, value_name = "DIR")]
        out: PathBuf,
    },
}

/// Arguments for `results upload`.
#[derive(Args, Debug)]
struct ResultUploadArgs {
    /// Calibration hash id.
    #[arg(long, value_name = "ID")]
    hash_id: String,
    /// Result name.
    #[arg(long)]
    name: String,
    /// Optional run tag.
    #[arg(long, value_name = "RUN")]
    run_id: Option<String>,
    /// Free-form notes.
    #[arg(long)]
    notes: Option<String>,
    /// Files to pack.
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,
}

/// Best-run subcommands.
#[derive(Subcommand, Debug)]
enum BestRunsCommand {
    /// Append a best-run pointer.
    Set {
        /// Calibration hash id the run belongs to.
        #[arg(long, value_name = "ID")]
        calibration_hash_id: String,
        /// Run tag.
        #[arg(long, value_name = "RUN")]
        run_id: String,
    },
    /// Show the newest best-run pointer.
    Get,
    /// List best-run pointer history.
    List {
        /// Maximum entries (server clamps to 1..=100).
        #[arg(long)]
        limit: Option<i64>,
    },
}

/// Per-invocation client overrides taken from global flags.
struct ClientOverrides {
    /// Server URL override.
    server: Option<String>,
    /// API token override.
    api_token: Option<String>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for localized error messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a localized message.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&t!("main.version", version = version))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };
    let overrides = ClientOverrides {
        server: cli.server,
        api_token: cli.api_token,
    };

    match command {
        Commands::Serve(command) => command_serve(command, overrides.api_token).await,
        Commands::Config {
            command,
        } => command_config(command),
        Commands::Client {
            command,
        } => command_client(command, overrides),
        Commands::Calibrations {
            command,
        } => command_calibrations(command, overrides).await,
        Commands::Results {
            command,
        } => command_results(command, overrides).await,
        Commands::Bestruns {
            command,
        } => command_bestruns(command, overrides).await,
    }
}

/// Prints top-level help.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(())
}

// ============================================================================
// SECTION: Server Commands
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand, api_token: Option<String>) -> CliResult<ExitCode> {
    let path = VaultConfig::resolve_path(command.config.as_deref())
        .map_err(|err| CliError::new(t!("config.load_failed", error = err)))?;
    if let Some(token) = api_token {
        persist_api_token(&path, &token).map_err(|err| {
            CliError::new(t!(
                "serve.token.persist_failed",
                path = path.display(),
                error = err
            ))
        })?;
        write_stderr_line(&t!("serve.token.persisted", path = path.display()))
            .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    }

    let config = VaultConfig::load(Some(&path))
        .map_err(|err| CliError::new(t!("config.load_failed", error = err)))?;
    let server = tokio::task::spawn_blocking(move || VaultServer::from_config(config))
        .await
        .map_err(|err| {
            CliError::new(t!("serve.init_failed", error = format!("init join failed: {err}")))
        })?
        .map_err(|err| CliError::new(t!("serve.init_failed", error = err)))?;
    write_stderr_line(&t!("serve.listening", bind = server.bind_addr()))
        .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    server
        .serve()
        .await
        .map_err(|err: VaultServerError| CliError::new(t!("serve.failed", error = err)))?;

    Ok(ExitCode::SUCCESS)
}

/// Executes config subcommands.
fn command_config(command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate {
            config,
        } => {
            VaultConfig::load(config.as_deref())
                .map_err(|err| CliError::new(t!("config.load_failed", error = err)))?;
            write_stdout_line(&t!("config.validate.ok"))
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ============================================================================
// SECTION: Client Commands
// ============================================================================

/// Executes client profile subcommands.
fn command_client(command: ClientCommand, overrides: ClientOverrides) -> CliResult<ExitCode> {
    match command {
        ClientCommand::SetServer {
            url,
        } => {
            let path = ClientProfile::resolve_path(None);
            let profile = ClientProfile::load(&path)
                .map_err(|err| CliError::new(t!("client.profile.load_failed", error = err)))?
                .with_overrides(Some(url), overrides.api_token);
            profile.save(&path).map_err(|err| {
                CliError::new(t!(
                    "client.profile.save_failed",
                    path = path.display(),
                    error = err
                ))
            })?;
            write_stdout_line(&t!(
                "client.profile.saved",
                path = path.display(),
                url = profile.server_url
            ))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Builds a [`VaultClient`] from the saved profile plus overrides.
fn build_client(overrides: ClientOverrides) -> CliResult<VaultClient> {
    let path = ClientProfile::resolve_path(None);
    let profile = ClientProfile::load(&path)
        .map_err(|err| CliError::new(t!("client.profile.load_failed", error = err)))?
        .with_overrides(overrides.server, overrides.api_token);
    VaultClient::new(&profile).map_err(|err| CliError::new(t!("client.init_failed", error = err)))
}

/// Executes calibration subcommands.
async fn command_calibrations(
    command: CalibrationsCommand,
    overrides: ClientOverrides,
) -> CliResult<ExitCode> {
    let client = build_client(overrides)?;
    match command {
        CalibrationsCommand::Upload {
            hash_id,
            notes,
            files,
        } => {
            let response = client
                .upload_calibration(&hash_id, notes.as_deref(), &files)
                .await
                .map_err(request_error)?;
            write_json(&response)?;
        }
        CalibrationsCommand::List => {
            let response = client.list_calibrations().await.map_err(request_error)?;
            write_json(&response)?;
        }
        CalibrationsCommand::Latest => {
            let response = client.latest_calibration().await.map_err(request_error)?;
            write_json(&response.unwrap_or_else(|| Value::Object(serde_json::Map::new())))?;
        }
        CalibrationsCommand::Download {
            hash_id,
            out,
        } => {
            let bundle =
                client.download_calibration(&hash_id, &out).await.map_err(request_error)?;
            write_download(&bundle, &out)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Executes result subcommands.
async fn command_results(
    command: ResultsCommand,
    overrides: ClientOverrides,
) -> CliResult<ExitCode> {
    let client = build_client(overrides)?;
    match command {
        ResultsCommand::Upload(args) => {
            let upload = ResultUpload {
                hash_id: &args.hash_id,
                name: &args.name,
                run_id: args.run_id.as_deref(),
                notes: args.notes.as_deref(),
            };
            let response =
                client.upload_result(upload, &args.files).await.map_err(request_error)?;
            write_json(&response)?;
        }
        ResultsCommand::List {
            hash_id,
        } => {
            let response = client.list_results(&hash_id).await.map_err(request_error)?;
            write_json(&response)?;
        }
        ResultsCommand::Download {
            hash_id,
            name,
            run_id,
            out,
        } => {
            let bundle = client
                .download_result(&hash_id, &name, run_id.as_deref(), &out)
                .await
                .map_err(request_error)?;
            write_download(&bundle, &out)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Executes best-run subcommands.
async fn command_bestruns(
    command: BestRunsCommand,
    overrides: ClientOverrides,
) -> CliResult<ExitCode> {
    let client = build_client(overrides)?;
    let response = match command {
        BestRunsCommand::Set {
            calibration_hash_id,
            run_id,
        } => client.set_best_run(&calibration_hash_id, &run_id).await,
        BestRunsCommand::Get => client.get_best_run().await,
        BestRunsCommand::List {
            limit,
        } => client.list_best_runs(limit).await,
    }
    .map_err(request_error)?;
    write_json(&response)?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Maps a client failure to a localized CLI error.
fn request_error(err: bundle_vault_cli::client::ClientError) -> CliError {
    CliError::new(t!("client.request_failed", error = err))
}

/// Writes a JSON value to stdout in pretty form.
fn write_json(value: &Value) -> CliResult<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(t!("output.serialize_failed", error = err)))?;
    write_stdout_line(&rendered).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Reports downloaded bundle metadata and the unpacked files.
fn write_download(bundle: &DownloadedBundle, out: &Path) -> CliResult<()> {
    write_json(&bundle.metadata)?;
    write_stderr_line(&t!("download.saved", count = bundle.entries.len(), dir = out.display()))
        .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    for file in &bundle.files {
        write_stderr_line(&t!("download.file", path = file.display()))
            .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    }
    Ok(())
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats a localized output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    let stream_label = match stream {
        "stderr" => t!("output.stream.stderr"),
        _ => t!("output.stream.stdout"),
    };
    t!("output.write_failed", stream = stream_label, error = error)
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
