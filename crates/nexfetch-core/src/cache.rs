//! Local cache check: does the file already on disk match the expected digest?
//!
//! Read-only probe. The file is never truncated, modified or removed here,
//! whatever the outcome.

use crate::checksum::ChecksumAlgorithm;
use std::path::Path;

/// Result of a successful cache probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheHit {
    /// Size of the matching file in bytes.
    pub size_bytes: u64,
}

/// Returns the existing file's size when `path` hashes to `expected_hex`.
///
/// Any failure to open or read the file counts as a miss.
pub fn probe(path: &Path, algorithm: ChecksumAlgorithm, expected_hex: &str) -> Option<CacheHit> {
    if !path.is_file() {
        tracing::debug!(path = %path.display(), "cache miss: file does not exist");
        return None;
    }
    tracing::debug!(path = %path.display(), expected = expected_hex, "file exists, checking {}", algorithm);
    match algorithm.digest_path(path) {
        Ok((actual, size_bytes)) => {
            tracing::trace!(actual = %actual, "calculated hash value");
            if actual == expected_hex {
                Some(CacheHit { size_bytes })
            } else {
                tracing::debug!(path = %path.display(), "cache miss: digest differs");
                None
            }
        }
        Err(e) => {
            tracing::debug!(path = %path.display(), "cache miss: cannot read file: {}", e);
            None
        }
    }
}

/// True when the file at `path` already satisfies `expected_hex`.
pub fn is_satisfied(path: &Path, algorithm: ChecksumAlgorithm, expected_hex: &str) -> bool {
    probe(path, algorithm, expected_hex).is_some()
}
