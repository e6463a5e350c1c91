//! CLI command handlers, one file per command.

mod checksum;
mod completions;
mod fetch;
mod man;
mod search;

pub use checksum::run_checksum;
pub use completions::run_completions;
pub use fetch::run_fetch;
pub use man::run_man;
pub use search::run_search;

use anyhow::Result;
use nexfetch_core::CancelToken;

/// Run blocking engine work on the blocking pool; Ctrl-C cancels it through the token.
async fn run_cancellable<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&CancelToken) -> T + Send + 'static,
{
    let cancel = CancelToken::new();
    let worker_cancel = cancel.clone();
    let mut handle = tokio::task::spawn_blocking(move || work(&worker_cancel));
    let out = tokio::select! {
        res = &mut handle => res?,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupt received, cancelling");
            cancel.cancel();
            handle.await?
        }
    };
    Ok(out)
}
