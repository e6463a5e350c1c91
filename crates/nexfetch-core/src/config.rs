use crate::checksum::ChecksumAlgorithm;
use crate::credentials::{CommandSecretStore, EnvSecretStore, NoSecretStore, SecretStore};
use crate::http::HttpOptions;
use crate::search::SearchShape;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Repository queried when none is configured.
pub const DEFAULT_REPOSITORY: &str = "raw-trusted";

fn default_repository() -> String {
    DEFAULT_REPOSITORY.to_string()
}

/// Where `gcp_secret!` password references are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretBackend {
    /// Secret references fail.
    #[default]
    None,
    /// The secret id names an environment variable.
    Env,
    /// Run `command` with `{id}` substituted; stdout is the secret.
    Command,
}

/// `[secrets]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretsConfig {
    #[serde(default)]
    pub backend: SecretBackend,
    /// Argv for the command backend, e.g. `["gcloud", "secrets", "versions", "access", "latest", "--secret={id}"]`.
    #[serde(default)]
    pub command: Vec<String>,
}

impl SecretsConfig {
    /// Build the configured secret store.
    pub fn store(&self) -> Result<Box<dyn SecretStore + Send + Sync>> {
        Ok(match self.backend {
            SecretBackend::None => Box::new(NoSecretStore),
            SecretBackend::Env => Box::new(EnvSecretStore),
            SecretBackend::Command => Box::new(
                CommandSecretStore::new(self.command.clone())
                    .context("secrets.backend = \"command\" needs secrets.command")?,
            ),
        })
    }
}

/// Global configuration loaded from `~/.config/nexfetch/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NexfetchConfig {
    /// Default Nexus host when `--server` is not given.
    #[serde(default)]
    pub server: Option<String>,
    /// Repository searched for assets.
    #[serde(default = "default_repository")]
    pub repository: String,
    /// Wire shape of the search response: "flat" (asset search) or "nested" (component search).
    #[serde(default)]
    pub search_shape: SearchShape,
    /// Checksum key verified after download: "md5" (default), "sha256" or "sha512".
    #[serde(default)]
    pub checksum_algorithm: ChecksumAlgorithm,
    /// Directory for per-destination lock files; defaults to the XDG state dir.
    #[serde(default)]
    pub lock_dir: Option<PathBuf>,
    #[serde(default)]
    pub http: HttpOptions,
    #[serde(default)]
    pub secrets: SecretsConfig,
}

impl Default for NexfetchConfig {
    fn default() -> Self {
        Self {
            server: None,
            repository: default_repository(),
            search_shape: SearchShape::default(),
            checksum_algorithm: ChecksumAlgorithm::default(),
            lock_dir: None,
            http: HttpOptions::default(),
            secrets: SecretsConfig::default(),
        }
    }
}

impl NexfetchConfig {
    /// Lock directory to use: the configured one, else `$XDG_STATE_HOME/nexfetch/locks`.
    pub fn resolved_lock_dir(&self) -> Result<PathBuf> {
        match &self.lock_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_lock_dir(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("nexfetch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

pub fn default_lock_dir() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("nexfetch")?;
    Ok(xdg_dirs.create_state_directory("locks")?)
}

/// Load configuration from `path`.
pub fn load_from(path: &Path) -> Result<NexfetchConfig> {
    let data = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: NexfetchConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<NexfetchConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = NexfetchConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from(&path)
}
