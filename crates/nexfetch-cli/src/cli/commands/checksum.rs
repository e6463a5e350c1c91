//! Checksum command: digest a local file.

use anyhow::{Context, Result};
use nexfetch_core::checksum::ChecksumAlgorithm;
use std::path::Path;

/// Compute and print the digest of the given file.
pub async fn run_checksum(path: &Path, algorithm: ChecksumAlgorithm) -> Result<()> {
    let (digest, _) = algorithm
        .digest_path(path)
        .with_context(|| format!("read {}", path.display()))?;
    println!("{}  {}", digest, path.display());
    Ok(())
}
