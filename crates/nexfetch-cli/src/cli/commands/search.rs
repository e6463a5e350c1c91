//! Search command: print the single matching asset descriptor.

use anyhow::Result;
use nexfetch_core::config::NexfetchConfig;
use nexfetch_core::Fetcher;
use std::path::Path;

use super::run_cancellable;
use crate::cli::AssetArgs;

pub async fn run_search(cfg: &NexfetchConfig, asset: &AssetArgs) -> Result<()> {
    let cfg = asset.effective_config(cfg, None);
    // Destination is unused by a search.
    let request = asset.request(&cfg, Path::new("."))?;
    let fetcher = Fetcher::from_config(&cfg)?;

    let found = run_cancellable(move |cancel| fetcher.search(&request, cancel)).await??;
    println!("{}", serde_json::to_string_pretty(&found)?);
    Ok(())
}
