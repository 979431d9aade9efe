// crates/bundle-vault-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Tests
// Description: Unit tests for argument parsing in the CLI entry point.
// Purpose: Keep the subcommand surface and global overrides stable.
// Dependencies: clap, bundle-vault-cli main
// ============================================================================

//! ## Overview
//! Parses representative command lines and checks the resulting commands.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;

use clap::CommandFactory;
use clap::Parser;

use super::BestRunsCommand;
use super::CalibrationsCommand;
use super::Cli;
use super::Commands;
use super::ResultsCommand;
use super::output_error;

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn command_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn global_overrides_follow_subcommands() {
    let cli = Cli::try_parse_from([
        "bundle-vault",
        "calibrations",
        "list",
        "--server",
        "http://vault:5050",
        "--api-token",
        "secret",
    ])
    .unwrap();
    assert_eq!(cli.server.as_deref(), Some("http://vault:5050"));
    assert_eq!(cli.api_token.as_deref(), Some("secret"));
    assert!(matches!(
        cli.command,
        Some(Commands::Calibrations {
            command: CalibrationsCommand::List
        })
    ));
}

#[test]
fn calibration_upload_requires_files() {
    let result = Cli::try_parse_from(["bundle-vault", "calibrations", "upload", "--hash-id", "H1"]);
    assert!(result.is_err());
}

#[test]
fn result_upload_collects_files_and_optional_run() {
    let cli = Cli::try_parse_from([
        "bundle-vault",
        "results",
        "upload",
        "--hash-id",
        "H1",
        "--name",
        "metrics",
        "a.csv",
        "b.csv",
    ])
    .unwrap();
    let Some(Commands::Results {
        command: ResultsCommand::Upload(args),
    }) = cli.command
    else {
        panic!("expected results upload");
    };
    assert_eq!(args.hash_id, "H1");
    assert_eq!(args.name, "metrics");
    assert!(args.run_id.is_none());
    assert_eq!(args.files, vec![PathBuf::from("a.csv"), PathBuf::from("b.csv")]);
}

#[test]
fn bestruns_list_parses_limit() {
    let cli = Cli::try_parse_from(["bundle-vault", "bestruns", "list", "--limit", "5"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Bestruns {
            command: BestRunsCommand::List {
                limit: Some(5)
            }
        })
    ));
}

#[test]
fn version_flag_needs_no_subcommand() {
    let cli = Cli::try_parse_from(["bundle-vault", "--version"]).unwrap();
    assert!(cli.show_version);
    assert!(cli.command.is_none());
}

#[test]
fn output_error_names_the_stream() {
    let err = std::io::Error::other("closed");
    assert_eq!(output_error("stderr", &err), "Failed to write to stderr: closed");
}
