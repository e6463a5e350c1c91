//! Single-stream HTTP GET of an asset into its destination file.
//!
//! The destination is opened (and truncated) only once the final response is
//! known to be a 200, so an error status never clobbers a previous download.
//! A failure mid-stream leaves the partial file in place.

use crate::control::CancelToken;
use crate::error::{FetchError, Result};
use crate::http::{self, HttpOptions};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

/// Create `dir` and any missing parents. An existing directory is fine.
fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o750);
    }
    builder.create(dir)
}

/// Flush buffered bytes to disk. The failure is logged here as well, since a
/// transfer error takes precedence over it in what [`download`] returns.
fn flush_writer(writer: Option<BufWriter<File>>, destination: &Path) -> Result<()> {
    let Some(mut w) = writer else {
        return Ok(());
    };
    w.flush().map_err(|e| {
        tracing::debug!(path = %destination.display(), "flushing download failed: {}", e);
        FetchError::io(destination, e)
    })
}

/// Downloads `url` to `destination`, overwriting existing content.
/// Returns the number of bytes written.
pub fn download(
    url: &str,
    destination: &Path,
    auth: Option<&str>,
    opts: &HttpOptions,
    cancel: &CancelToken,
) -> Result<u64> {
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        tracing::trace!(dir = %parent.display(), "creating directory for download");
        ensure_dir(parent).map_err(|e| FetchError::io(parent, e))?;
    }

    let mut writer: Option<BufWriter<File>> = None;
    let mut written = 0u64;
    let open = || -> Result<BufWriter<File>> {
        tracing::trace!(path = %destination.display(), "creating file");
        File::create(destination)
            .map(BufWriter::new)
            .map_err(|e| FetchError::io(destination, e))
    };

    tracing::trace!(url, "downloading file");
    let resp = http::get(
        url,
        auth,
        Duration::from_secs(opts.download_timeout_secs),
        opts,
        cancel,
        |status, chunk| {
            if status != 200 {
                // Body of an error response; discarded.
                return Ok(());
            }
            if writer.is_none() {
                writer = Some(open()?);
            }
            if let Some(w) = writer.as_mut() {
                w.write_all(chunk)
                    .map_err(|e| FetchError::io(destination, e))?;
            }
            written += chunk.len() as u64;
            Ok(())
        },
    );

    // Flush what arrived even when the transfer failed; the partial file stays.
    let started = writer.is_some();
    let flushed = flush_writer(writer.take(), destination);
    let resp = match resp {
        // Connection lost after the body started streaming.
        Err(FetchError::Transport { source, .. }) if started => {
            return Err(FetchError::io(
                destination,
                std::io::Error::new(std::io::ErrorKind::Other, source),
            ));
        }
        other => other?,
    };
    flushed?;

    if resp.status != 200 {
        return Err(FetchError::UpstreamRequest {
            url: url.to_string(),
            status: resp.status,
        });
    }
    if written == 0 {
        // Empty body: still produce the (empty) file.
        open()?;
    }
    tracing::debug!(url, bytes = written, path = %destination.display(), "download finished");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_dir_creates_nested_and_tolerates_existing() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b").join("c");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
        ensure_dir(&nested).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn ensure_dir_uses_restricted_mode() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("deps");
        ensure_dir(&nested).unwrap();
        let mode = fs::metadata(&nested).unwrap().permissions().mode() & 0o777;
        // umask can only remove bits.
        assert_eq!(mode & !0o750, 0);
    }

    #[test]
    fn flush_without_writer_is_ok() {
        assert!(flush_writer(None, Path::new("/nonexistent")).is_ok());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn flush_failure_is_reported() {
        let full = Path::new("/dev/full");
        let mut w = BufWriter::new(File::options().write(true).open(full).unwrap());
        w.write_all(b"partial body").unwrap();
        let err = flush_writer(Some(w), full).unwrap_err();
        assert!(matches!(err, FetchError::DownloadIo { .. }));
    }
}
