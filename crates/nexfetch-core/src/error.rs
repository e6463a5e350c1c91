//! Error taxonomy for the fetch-verify workflow.
//!
//! Every variant is terminal: nothing in the core retries. Variants carry the
//! URL, path, status or count needed to diagnose a failure from the message alone.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by credential resolution, search, download and verification.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Both a username/password pair and a pre-encoded token were supplied.
    #[error("cannot provide basic_auth as well as username/password")]
    ConflictingCredentials,

    /// Only one of username or password was supplied.
    #[error("provide both username and password, or neither")]
    IncompleteCredentials,

    /// The pre-encoded basic auth token is not valid base64.
    #[error("provided basic_auth is not a valid base64 string: {0}")]
    InvalidCredentialFormat(#[source] base64::DecodeError),

    /// The secret store could not produce the referenced password.
    #[error("failed to resolve password from secret {id}: {source}")]
    SecretResolution {
        id: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Upstream answered with something other than 200.
    #[error("HTTP request to {url} failed with response code {status}")]
    UpstreamRequest { url: String, status: u32 },

    /// Search response was not `application/json`.
    #[error("invalid Content-Type from {url}: expected application/json but got {}", .content_type.as_deref().unwrap_or("<none>"))]
    UnexpectedContentType {
        url: String,
        content_type: Option<String>,
    },

    /// Search response body did not match the configured shape.
    #[error("malformed search response from {url}: {source}")]
    InvalidSearchResponse {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// Search matched zero or more than one asset.
    #[error("failed to find exactly one {level} (got {count})")]
    AmbiguousOrMissingAsset { level: &'static str, count: usize },

    /// The matched asset has no checksum for the configured algorithm.
    #[error("asset {asset_id} has no {algorithm} checksum")]
    MissingChecksum { asset_id: String, algorithm: String },

    /// Network-level failure (DNS, connect, TLS, timeout).
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: curl::Error,
    },

    /// Creating, writing or re-reading the destination failed.
    #[error("I/O error on {}: {source}", .path.display())]
    DownloadIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The downloaded file does not hash to the expected checksum.
    #[error("downloaded checksum of {} does not match: expected {expected}, got {actual}", .path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// The per-destination lock could not be taken.
    #[error("failed to lock {}: {source}", .path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The fetch was cancelled through its token.
    #[error("fetch cancelled")]
    Cancelled,
}

impl FetchError {
    /// True for errors caused by the supplied configuration rather than upstream.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            FetchError::ConflictingCredentials
                | FetchError::IncompleteCredentials
                | FetchError::InvalidCredentialFormat(_)
        )
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FetchError::DownloadIo {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = FetchError> = std::result::Result<T, E>;
