//! Fetch command: ensure the asset is present and verified.

use anyhow::Result;
use nexfetch_core::checksum::ChecksumAlgorithm;
use nexfetch_core::config::NexfetchConfig;
use nexfetch_core::{FetchFailure, Fetcher};
use std::path::Path;

use super::run_cancellable;
use crate::cli::AssetArgs;

/// Run one fetch and print the resulting fields as JSON on stdout.
/// On failure, whatever was learned before the error is printed to stderr.
pub async fn run_fetch(
    cfg: &NexfetchConfig,
    asset: &AssetArgs,
    destination: &Path,
    algorithm: Option<ChecksumAlgorithm>,
) -> Result<()> {
    let cfg = asset.effective_config(cfg, algorithm);
    let request = asset.request(&cfg, destination)?;
    let fetcher = Fetcher::from_config(&cfg)?;
    tracing::info!(
        server = %request.server_host,
        repository = %request.repository_name,
        asset = %request.asset_name,
        algorithm = %fetcher.algorithm(),
        "fetch"
    );

    let name = request.asset_name.clone();
    let result = run_cancellable(move |cancel| fetcher.fetch_verified(&request, cancel)).await?;

    match result {
        Ok(outcome) => {
            println!("{}", serde_json::to_string_pretty(&outcome.fields())?);
            Ok(())
        }
        Err(FetchFailure {
            error,
            state,
            partial,
        }) => {
            if !partial.is_empty() {
                eprintln!("{}", serde_json::to_string_pretty(&partial.fields())?);
            }
            Err(anyhow::Error::new(error).context(format!("fetch of {} failed after {}", name, state)))
        }
    }
}
