//! Fetch a named asset from a Nexus raw repository, verify it against the
//! repository's checksum, and keep the local copy as a cache.

pub mod config;
pub mod logging;

pub mod cache;
pub mod checksum;
pub mod control;
pub mod credentials;
pub mod download;
pub mod error;
pub mod fetch;
mod http;
pub mod lock;
pub mod search;

pub use control::CancelToken;
pub use credentials::{CredentialSpec, SecretStore};
pub use error::FetchError;
pub use fetch::{FetchFailure, FetchOutcome, FetchRequest, FetchState, Fetcher, PartialOutcome};
pub use http::HttpOptions;
pub use search::{AssetDescriptor, SearchClient, SearchShape};
