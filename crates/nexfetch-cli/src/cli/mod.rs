//! CLI for nexfetch.

mod commands;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use nexfetch_core::checksum::ChecksumAlgorithm;
use nexfetch_core::config::{self, NexfetchConfig};
use nexfetch_core::{CredentialSpec, FetchRequest, SearchShape};
use std::path::{Path, PathBuf};

use commands::{run_checksum, run_completions, run_fetch, run_man, run_search};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "nexfetch")]
#[command(about = "Fetch an artifact from a Nexus raw repository, verify its checksum, and cache it locally", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

/// Which asset to look up, where, and how to authenticate.
#[derive(Debug, Args)]
pub struct AssetArgs {
    /// Nexus host (e.g. nexus.example.com) or base URL. Defaults to `server` in config.toml.
    #[arg(long, env = "NEXFETCH_SERVER")]
    pub server: Option<String>,

    /// Repository to search. Defaults to `repository` in config.toml.
    #[arg(long)]
    pub repository: Option<String>,

    /// Asset name within the repository.
    #[arg(long)]
    pub name: String,

    /// Username for Basic auth (requires --password).
    #[arg(long, env = "NEXFETCH_USERNAME")]
    pub username: Option<String>,

    /// Password for Basic auth. `gcp_secret!<id>` is resolved through the configured secret store.
    #[arg(long, env = "NEXFETCH_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Pre-encoded Basic auth token (base64 of `user:password`).
    #[arg(long, env = "NEXFETCH_BASIC_AUTH", hide_env_values = true)]
    pub basic_auth: Option<String>,

    /// Search response shape: flat or nested. Overrides config.toml.
    #[arg(long, value_name = "SHAPE")]
    pub shape: Option<SearchShape>,
}

impl AssetArgs {
    /// Build a fetch request, filling server and repository from config.
    pub fn request(&self, cfg: &NexfetchConfig, destination: &Path) -> Result<FetchRequest> {
        let server = self
            .server
            .clone()
            .or_else(|| cfg.server.clone())
            .context("no server given: pass --server or set `server` in config.toml")?;
        let repository = self
            .repository
            .clone()
            .unwrap_or_else(|| cfg.repository.clone());
        let credentials = CredentialSpec::from_fields(
            self.username.as_deref(),
            self.password.as_deref(),
            self.basic_auth.as_deref(),
        )?;
        Ok(FetchRequest::new(server, self.name.clone(), destination)
            .with_repository(repository)
            .with_credentials(credentials))
    }

    /// Config with command-line overrides applied.
    pub fn effective_config(
        &self,
        cfg: &NexfetchConfig,
        algorithm: Option<ChecksumAlgorithm>,
    ) -> NexfetchConfig {
        let mut cfg = cfg.clone();
        if let Some(shape) = self.shape {
            cfg.search_shape = shape;
        }
        if let Some(algorithm) = algorithm {
            cfg.checksum_algorithm = algorithm;
        }
        cfg
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Make sure the asset is present and verified in a directory, downloading when needed.
    Fetch {
        #[command(flatten)]
        asset: AssetArgs,

        /// Directory the asset is placed in (created if missing).
        #[arg(long, value_name = "DIR")]
        destination: PathBuf,

        /// Checksum to verify: md5, sha256 or sha512. Overrides config.toml.
        #[arg(long, value_name = "ALG")]
        algorithm: Option<ChecksumAlgorithm>,
    },

    /// Look up the asset and print its descriptor without downloading.
    Search {
        #[command(flatten)]
        asset: AssetArgs,
    },

    /// Compute the checksum of a local file.
    Checksum {
        /// Path to the file.
        path: PathBuf,

        /// md5, sha256 or sha512. Defaults to `checksum_algorithm` in config.toml.
        #[arg(long, value_name = "ALG")]
        algorithm: Option<ChecksumAlgorithm>,
    },

    /// Print shell completions to stdout.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Print the man page to stdout.
    Man,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        // Generators must not create a config file as a side effect.
        let command = match cli.command {
            CliCommand::Completions { shell } => return run_completions(shell),
            CliCommand::Man => return run_man(),
            other => other,
        };

        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match command {
            CliCommand::Fetch {
                asset,
                destination,
                algorithm,
            } => run_fetch(&cfg, &asset, &destination, algorithm).await?,
            CliCommand::Search { asset } => run_search(&cfg, &asset).await?,
            CliCommand::Checksum { path, algorithm } => {
                run_checksum(&path, algorithm.unwrap_or(cfg.checksum_algorithm)).await?
            }
            CliCommand::Completions { .. } | CliCommand::Man => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
