//! Fetch orchestration: credentials, search, cache check, download, verify.
//!
//! Strictly sequential per request. The only state is the destination file;
//! its digest is recomputed on every run. A file that fails verification is
//! left on disk, so the next run re-checks it, misses, and downloads again.

use crate::cache;
use crate::checksum::ChecksumAlgorithm;
use crate::config::{NexfetchConfig, DEFAULT_REPOSITORY};
use crate::control::CancelToken;
use crate::credentials::{self, CredentialSpec, NoSecretStore, SecretStore};
use crate::download;
use crate::error::{FetchError, Result};
use crate::http::HttpOptions;
use crate::lock;
use crate::search::{AssetDescriptor, SearchClient, SearchShape};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// What to fetch and where to put it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub server_host: String,
    pub repository_name: String,
    pub asset_name: String,
    pub destination_dir: PathBuf,
    pub credentials: CredentialSpec,
}

impl FetchRequest {
    /// Request against the default repository with no credentials.
    pub fn new(
        server_host: impl Into<String>,
        asset_name: impl Into<String>,
        destination_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            server_host: server_host.into(),
            repository_name: DEFAULT_REPOSITORY.to_string(),
            asset_name: asset_name.into(),
            destination_dir: destination_dir.into(),
            credentials: CredentialSpec::None,
        }
    }

    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository_name = repository.into();
        self
    }

    pub fn with_credentials(mut self, credentials: CredentialSpec) -> Self {
        self.credentials = credentials;
        self
    }

    /// `destination_dir + "/" + asset_name`. Asset names containing `/`
    /// land in subdirectories.
    pub fn destination_path(&self) -> PathBuf {
        let mut p = self.destination_dir.as_os_str().to_owned();
        p.push("/");
        p.push(&self.asset_name);
        PathBuf::from(p)
    }
}

/// Workflow position. A failure records the last state reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchState {
    #[default]
    Init,
    CredentialResolved,
    Searched,
    CacheChecked,
    DownloadSkipped,
    Downloaded,
    Verified,
    Done,
}

impl fmt::Display for FetchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FetchState::Init => "init",
            FetchState::CredentialResolved => "credential-resolved",
            FetchState::Searched => "searched",
            FetchState::CacheChecked => "cache-checked",
            FetchState::DownloadSkipped => "download-skipped",
            FetchState::Downloaded => "downloaded",
            FetchState::Verified => "verified",
            FetchState::Done => "done",
        };
        f.write_str(s)
    }
}

/// A verified asset on local disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchOutcome {
    pub asset_id: String,
    pub asset_url: String,
    pub checksum_hex: String,
    pub content_type: String,
    /// Stable identity of the fetched asset for the caller.
    pub local_path: PathBuf,
    pub size_bytes: u64,
    /// True when the existing file already matched and nothing was downloaded.
    pub cache_hit: bool,
}

impl FetchOutcome {
    /// Exported identifier; equal to the checksum.
    pub fn id(&self) -> &str {
        &self.checksum_hex
    }

    /// Output fields under their external attribute names.
    pub fn fields(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("asset_id", self.asset_id.clone()),
            ("asset_url", self.asset_url.clone()),
            ("asset_md5", self.checksum_hex.clone()),
            ("asset_content_type", self.content_type.clone()),
            ("asset_path", self.local_path.display().to_string()),
            ("asset_size", self.size_bytes.to_string()),
            ("id", self.checksum_hex.clone()),
        ])
    }
}

/// Output fields known when a fetch failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialOutcome {
    pub asset_id: Option<String>,
    pub asset_url: Option<String>,
    pub checksum_hex: Option<String>,
    pub content_type: Option<String>,
    pub local_path: Option<PathBuf>,
    pub size_bytes: Option<u64>,
}

impl PartialOutcome {
    pub fn is_empty(&self) -> bool {
        *self == PartialOutcome::default()
    }

    /// Known fields under their external attribute names.
    pub fn fields(&self) -> BTreeMap<&'static str, String> {
        let mut m = BTreeMap::new();
        let mut put = |k: &'static str, v: Option<String>| {
            if let Some(v) = v {
                m.insert(k, v);
            }
        };
        put("asset_id", self.asset_id.clone());
        put("asset_url", self.asset_url.clone());
        put("asset_md5", self.checksum_hex.clone());
        put("id", self.checksum_hex.clone());
        put("asset_content_type", self.content_type.clone());
        put(
            "asset_path",
            self.local_path.as_ref().map(|p| p.display().to_string()),
        );
        put("asset_size", self.size_bytes.map(|n| n.to_string()));
        m
    }
}

/// A failed fetch: the error, where it happened, and what was already known.
#[derive(Debug)]
pub struct FetchFailure {
    pub error: FetchError,
    pub state: FetchState,
    pub partial: PartialOutcome,
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for FetchFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.error)
    }
}

/// Tracks the state machine and partial outputs of one run.
#[derive(Default)]
struct Progress {
    state: FetchState,
    partial: PartialOutcome,
}

impl Progress {
    fn advance(&mut self, next: FetchState) {
        tracing::debug!(from = %self.state, to = %next, "fetch state");
        self.state = next;
    }
}

fn check_cancel(cancel: &CancelToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(FetchError::Cancelled);
    }
    Ok(())
}

/// The fetch-verify-cache engine. Build once, reuse for any number of requests.
pub struct Fetcher {
    search: SearchClient,
    http: HttpOptions,
    algorithm: ChecksumAlgorithm,
    secrets: Box<dyn SecretStore + Send + Sync>,
    lock_dir: Option<PathBuf>,
}

impl Fetcher {
    /// Engine with md5 verification, no secret store and no destination locking.
    pub fn new(shape: SearchShape, http: HttpOptions) -> Self {
        Self {
            search: SearchClient::new(shape, http),
            http,
            algorithm: ChecksumAlgorithm::default(),
            secrets: Box::new(NoSecretStore),
            lock_dir: None,
        }
    }

    /// Engine configured from `config.toml`, with destination locking enabled.
    pub fn from_config(cfg: &NexfetchConfig) -> anyhow::Result<Self> {
        Ok(Self::new(cfg.search_shape, cfg.http)
            .with_algorithm(cfg.checksum_algorithm)
            .with_secret_store(cfg.secrets.store()?)
            .with_lock_dir(cfg.resolved_lock_dir()?))
    }

    pub fn with_algorithm(mut self, algorithm: ChecksumAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_secret_store(mut self, store: Box<dyn SecretStore + Send + Sync>) -> Self {
        self.secrets = store;
        self
    }

    /// Serialize fetches of the same destination through lock files in `dir`.
    pub fn with_lock_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.lock_dir = Some(dir.into());
        self
    }

    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    /// Resolve credentials and search, without touching the local file.
    pub fn search(&self, req: &FetchRequest, cancel: &CancelToken) -> Result<AssetDescriptor> {
        check_cancel(cancel)?;
        let auth = credentials::resolve(&req.credentials, self.secrets.as_ref())?;
        self.search.search(
            &req.server_host,
            &req.repository_name,
            &req.asset_name,
            auth.as_deref(),
            cancel,
        )
    }

    /// Make sure the requested asset is present at its destination and
    /// matches the repository's checksum, downloading it when needed.
    pub fn fetch_verified(
        &self,
        req: &FetchRequest,
        cancel: &CancelToken,
    ) -> std::result::Result<FetchOutcome, FetchFailure> {
        let mut progress = Progress::default();
        match self.run(req, cancel, &mut progress) {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                tracing::warn!(state = %progress.state, asset = %req.asset_name, "fetch failed: {}", error);
                Err(FetchFailure {
                    error,
                    state: progress.state,
                    partial: progress.partial,
                })
            }
        }
    }

    fn run(&self, req: &FetchRequest, cancel: &CancelToken, p: &mut Progress) -> Result<FetchOutcome> {
        check_cancel(cancel)?;
        let auth = credentials::resolve(&req.credentials, self.secrets.as_ref())?;
        p.advance(FetchState::CredentialResolved);

        check_cancel(cancel)?;
        let asset = self.search.search(
            &req.server_host,
            &req.repository_name,
            &req.asset_name,
            auth.as_deref(),
            cancel,
        )?;
        p.advance(FetchState::Searched);

        let destination = req.destination_path();
        p.partial.asset_id = Some(asset.id.clone());
        p.partial.asset_url = Some(asset.download_url.clone());
        p.partial.content_type = Some(asset.content_type.clone());
        p.partial.local_path = Some(destination.clone());

        let expected = asset
            .checksum(self.algorithm.key())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| FetchError::MissingChecksum {
                asset_id: asset.id.clone(),
                algorithm: self.algorithm.key().to_string(),
            })?
            .to_string();
        p.partial.checksum_hex = Some(expected.clone());

        let _guard = match &self.lock_dir {
            Some(dir) => Some(lock::acquire(dir, &destination, cancel)?),
            None => None,
        };

        check_cancel(cancel)?;
        let hit = cache::probe(&destination, self.algorithm, &expected);
        p.advance(FetchState::CacheChecked);

        if let Some(hit) = hit {
            p.advance(FetchState::DownloadSkipped);
            p.partial.size_bytes = Some(hit.size_bytes);
            p.advance(FetchState::Done);
            tracing::info!(path = %destination.display(), size = hit.size_bytes, "asset already up to date");
            return Ok(outcome(&asset, expected, destination, hit.size_bytes, true));
        }

        check_cancel(cancel)?;
        tracing::debug!(path = %destination.display(), "file missing or stale, will download");
        let written = download::download(
            &asset.download_url,
            &destination,
            auth.as_deref(),
            &self.http,
            cancel,
        )?;
        p.advance(FetchState::Downloaded);
        p.partial.size_bytes = Some(written);

        tracing::trace!("calculating hash");
        let (actual, size) = verify(&destination, self.algorithm)?;
        if actual != expected {
            return Err(FetchError::ChecksumMismatch {
                path: destination,
                expected,
                actual,
            });
        }
        p.advance(FetchState::Verified);
        p.partial.size_bytes = Some(size);
        p.advance(FetchState::Done);
        tracing::info!(path = %destination.display(), size, "asset downloaded and verified");
        Ok(outcome(&asset, expected, destination, size, false))
    }
}

fn verify(path: &Path, algorithm: ChecksumAlgorithm) -> Result<(String, u64)> {
    algorithm
        .digest_path(path)
        .map_err(|e| FetchError::io(path, e))
}

fn outcome(
    asset: &AssetDescriptor,
    checksum_hex: String,
    local_path: PathBuf,
    size_bytes: u64,
    cache_hit: bool,
) -> FetchOutcome {
    FetchOutcome {
        asset_id: asset.id.clone(),
        asset_url: asset.download_url.clone(),
        checksum_hex,
        content_type: asset.content_type.clone(),
        local_path,
        size_bytes,
        cache_hit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_request() -> FetchRequest {
        // Port 9 (discard) on loopback: nothing listens, and these tests must
        // fail before any connection is attempted anyway.
        FetchRequest::new("http://127.0.0.1:9", "tool.tgz", "/tmp/nexfetch-never")
    }

    #[test]
    fn destination_is_dir_slash_name() {
        let req = FetchRequest::new("nexus", "tools/tool.tgz", "/opt/deps");
        assert_eq!(req.destination_path(), PathBuf::from("/opt/deps/tools/tool.tgz"));
        assert_eq!(req.repository_name, "raw-trusted");
        assert_eq!(
            req.with_repository("raw-dev").repository_name,
            "raw-dev"
        );
    }

    #[test]
    fn malformed_token_fails_before_any_request() {
        let req = unreachable_request()
            .with_credentials(CredentialSpec::PreEncodedBasicAuthToken("not-base64!!".into()));
        let fetcher = Fetcher::new(SearchShape::Flat, HttpOptions::default());
        let failure = fetcher
            .fetch_verified(&req, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(failure.error, FetchError::InvalidCredentialFormat(_)));
        assert_eq!(failure.state, FetchState::Init);
        assert!(failure.partial.is_empty());
    }

    #[test]
    fn cancelled_token_stops_at_init() {
        let token = CancelToken::new();
        token.cancel();
        let fetcher = Fetcher::new(SearchShape::Flat, HttpOptions::default());
        let failure = fetcher.fetch_verified(&unreachable_request(), &token).unwrap_err();
        assert!(matches!(failure.error, FetchError::Cancelled));
        assert_eq!(failure.state, FetchState::Init);
    }

    #[test]
    fn outcome_fields_use_external_names() {
        let o = FetchOutcome {
            asset_id: "id1".to_string(),
            asset_url: "https://n/r/a".to_string(),
            checksum_hex: "d41d8cd98f00b204e9800998ecf8427e".to_string(),
            content_type: "application/octet-stream".to_string(),
            local_path: PathBuf::from("/deps/a"),
            size_bytes: 0,
            cache_hit: true,
        };
        let f = o.fields();
        assert_eq!(f["asset_size"], "0");
        assert_eq!(f["asset_md5"], f["id"]);
        assert_eq!(f["asset_path"], "/deps/a");
        assert_eq!(o.id(), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(f.len(), 7);
    }

    #[test]
    fn partial_fields_only_include_known_values() {
        let p = PartialOutcome {
            asset_id: Some("id1".to_string()),
            local_path: Some(PathBuf::from("/deps/a")),
            ..Default::default()
        };
        let f = p.fields();
        assert_eq!(f.len(), 2);
        assert_eq!(f["asset_id"], "id1");
        assert!(!f.contains_key("asset_size"));
        assert!(PartialOutcome::default().fields().is_empty());
    }

    #[test]
    fn failure_displays_inner_error() {
        let failure = FetchFailure {
            error: FetchError::Cancelled,
            state: FetchState::Searched,
            partial: PartialOutcome::default(),
        };
        assert_eq!(failure.to_string(), "fetch cancelled");
        assert_eq!(failure.state.to_string(), "searched");
    }
}
