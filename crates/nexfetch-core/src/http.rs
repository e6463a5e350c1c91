//! Blocking HTTP GET over libcurl, shared by search and download.
//!
//! Runs in the current thread; call from `spawn_blocking` if used from async code.

use crate::control::CancelToken;
use crate::error::{FetchError, Result};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::str;
use std::time::Duration;

/// Timeouts applied to upstream requests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpOptions {
    pub connect_timeout_secs: u64,
    /// Whole-request limit for the search call.
    pub search_timeout_secs: u64,
    /// Whole-request limit for the asset download.
    pub download_timeout_secs: u64,
    /// Abort a transfer that stays below this rate (bytes/s) for `low_speed_time_secs`.
    pub low_speed_limit_bytes: u32,
    pub low_speed_time_secs: u64,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 15,
            search_timeout_secs: 30,
            download_timeout_secs: 3600,
            low_speed_limit_bytes: 1024,
            low_speed_time_secs: 60,
        }
    }
}

/// Final status and media type of a completed GET.
#[derive(Debug, Clone)]
pub(crate) struct Response {
    pub status: u32,
    pub content_type: Option<String>,
}

/// Parse the status code from a header line such as `HTTP/1.1 200 OK`.
pub(crate) fn parse_status_line(line: &str) -> Option<u32> {
    if !line.starts_with("HTTP/") {
        return None;
    }
    line.split_whitespace().nth(1)?.parse().ok()
}

fn transport(url: &str, source: curl::Error) -> FetchError {
    FetchError::Transport {
        url: url.to_string(),
        source,
    }
}

/// Performs a GET, handing each body chunk to `on_body` together with the
/// status of the response it belongs to. Follows redirects.
///
/// `auth` is the value placed after `Basic ` in the Authorization header.
/// An error returned by `on_body` aborts the transfer and is returned as-is.
pub(crate) fn get<F>(
    url: &str,
    auth: Option<&str>,
    timeout: Duration,
    opts: &HttpOptions,
    cancel: &CancelToken,
    mut on_body: F,
) -> Result<Response>
where
    F: FnMut(u32, &[u8]) -> Result<()>,
{
    let status = Cell::new(0u32);
    let body_error: RefCell<Option<FetchError>> = RefCell::new(None);

    let mut easy = curl::easy::Easy::new();
    easy.url(url).map_err(|e| transport(url, e))?;
    easy.get(true).map_err(|e| transport(url, e))?;
    easy.follow_location(true).map_err(|e| transport(url, e))?;
    easy.max_redirections(10).map_err(|e| transport(url, e))?;
    easy.useragent(concat!("nexfetch/", env!("CARGO_PKG_VERSION")))
        .map_err(|e| transport(url, e))?;
    easy.connect_timeout(Duration::from_secs(opts.connect_timeout_secs))
        .map_err(|e| transport(url, e))?;
    easy.low_speed_limit(opts.low_speed_limit_bytes)
        .map_err(|e| transport(url, e))?;
    easy.low_speed_time(Duration::from_secs(opts.low_speed_time_secs))
        .map_err(|e| transport(url, e))?;
    easy.timeout(timeout).map_err(|e| transport(url, e))?;
    easy.progress(true).map_err(|e| transport(url, e))?;

    if let Some(auth) = auth {
        tracing::trace!("adding authentication header");
        let mut list = curl::easy::List::new();
        list.append(&format!("Authorization: Basic {}", auth))
            .map_err(|e| transport(url, e))?;
        easy.http_headers(list).map_err(|e| transport(url, e))?;
    }

    tracing::debug!(url, "sending request");
    {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|data| {
                if let Some(code) = str::from_utf8(data).ok().and_then(parse_status_line) {
                    status.set(code);
                }
                true
            })
            .map_err(|e| transport(url, e))?;
        transfer
            .write_function(|data| match on_body(status.get(), data) {
                Ok(()) => Ok(data.len()),
                Err(e) => {
                    body_error.borrow_mut().replace(e);
                    Ok(0) // abort transfer
                }
            })
            .map_err(|e| transport(url, e))?;
        transfer
            .progress_function(|_, _, _, _| !cancel.is_cancelled())
            .map_err(|e| transport(url, e))?;

        if let Err(e) = transfer.perform() {
            if e.is_write_error() {
                if let Some(err) = body_error.borrow_mut().take() {
                    return Err(err);
                }
            }
            if e.is_aborted_by_callback() || cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            return Err(transport(url, e));
        }
    }

    let code = easy.response_code().map_err(|e| transport(url, e))?;
    let content_type = easy
        .content_type()
        .map_err(|e| transport(url, e))?
        .map(str::to_string);
    tracing::debug!(url, status = code, content_type = ?content_type, "got response back");
    Ok(Response {
        status: code,
        content_type,
    })
}
