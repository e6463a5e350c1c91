//! Tests for checksum, completions and man subcommands.

use super::parse;
use crate::cli::CliCommand;
use clap_complete::Shell;
use nexfetch_core::checksum::ChecksumAlgorithm;
use std::path::PathBuf;

#[test]
fn cli_parse_checksum() {
    match parse(&["nexfetch", "checksum", "/tmp/file.bin"]) {
        CliCommand::Checksum { path, algorithm } => {
            assert_eq!(path, PathBuf::from("/tmp/file.bin"));
            assert!(algorithm.is_none());
        }
        _ => panic!("expected Checksum"),
    }
}

#[test]
fn cli_parse_checksum_algorithm() {
    match parse(&["nexfetch", "checksum", "f", "--algorithm", "sha512"]) {
        CliCommand::Checksum { algorithm, .. } => {
            assert_eq!(algorithm, Some(ChecksumAlgorithm::Sha512))
        }
        _ => panic!("expected Checksum with algorithm"),
    }
}

#[test]
fn cli_parse_completions() {
    match parse(&["nexfetch", "completions", "bash"]) {
        CliCommand::Completions { shell } => assert_eq!(shell, Shell::Bash),
        _ => panic!("expected Completions"),
    }
}

#[test]
fn cli_parse_man() {
    assert!(matches!(parse(&["nexfetch", "man"]), CliCommand::Man));
}

#[test]
fn cli_definition_is_consistent() {
    use clap::CommandFactory;
    crate::cli::Cli::command().debug_assert();
}
