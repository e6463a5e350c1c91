//! CLI parse tests.

use super::{Cli, CliCommand};
use clap::{CommandFactory, FromArgMatches};

/// The CLI definition with every `env = ".."` fallback removed, so parsing
/// does not depend on the caller's environment.
pub(super) fn command_without_env() -> clap::Command {
    Cli::command().mut_subcommands(|sc| sc.mut_args(|a| a.env(None::<&'static str>)))
}

pub(super) fn try_parse(args: &[&str]) -> Result<CliCommand, clap::Error> {
    let matches = command_without_env().try_get_matches_from(args)?;
    Cli::from_arg_matches(&matches).map(|cli| cli.command)
}

pub(super) fn parse(args: &[&str]) -> CliCommand {
    try_parse(args).unwrap()
}

mod rest;
