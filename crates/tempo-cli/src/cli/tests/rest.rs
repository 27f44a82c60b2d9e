//! Tests for status, cancel, remove, import, recover, completions.

use super::parse;
use crate::cli::CliCommand;

#[test]
fn cli_parse_status() {
    match parse(&["tempo", "status"]) {
        CliCommand::Status { id } => assert!(id.is_none()),
        _ => panic!("expected Status"),
    }
    match parse(&["tempo", "status", "4"]) {
        CliCommand::Status { id } => assert_eq!(id, Some(4)),
        _ => panic!("expected Status with id"),
    }
}

#[test]
fn cli_parse_cancel() {
    match parse(&["tempo", "cancel", "42"]) {
        CliCommand::Cancel { id } => assert_eq!(id, 42),
        _ => panic!("expected Cancel"),
    }
}

#[test]
fn cli_parse_remove() {
    match parse(&["tempo", "remove", "99"]) {
        CliCommand::Remove {
            id,
            delete_artifacts,
        } => {
            assert_eq!(id, 99);
            assert!(!delete_artifacts);
        }
        _ => panic!("expected Remove"),
    }
}

#[test]
fn cli_parse_remove_delete_artifacts() {
    match parse(&["tempo", "remove", "1", "--delete-artifacts"]) {
        CliCommand::Remove {
            delete_artifacts, ..
        } => assert!(delete_artifacts),
        _ => panic!("expected Remove with --delete-artifacts"),
    }
}

#[test]
fn cli_parse_import() {
    match parse(&["tempo", "import", "sites.csv", "--products", "no2,o3", "--dry-run"]) {
        CliCommand::Import {
            path,
            products,
            dry_run,
        } => {
            assert_eq!(path, std::path::PathBuf::from("sites.csv"));
            assert_eq!(products, "no2,o3");
            assert!(dry_run);
        }
        _ => panic!("expected Import"),
    }
}

#[test]
fn cli_parse_recover() {
    assert!(matches!(parse(&["tempo", "recover"]), CliCommand::Recover));
}

#[test]
fn cli_parse_completions() {
    match parse(&["tempo", "completions", "bash"]) {
        CliCommand::Completions { shell } => assert_eq!(shell, clap_complete::Shell::Bash),
        _ => panic!("expected Completions"),
    }
}
