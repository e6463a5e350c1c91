//! Tracing setup. The CLI logs to a file under the XDG state dir so stdout
//! stays clean for command output; stderr is the fallback.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Used when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "info,nexfetch=debug,nexfetch_core=debug";

const LOG_FILE: &str = "nexfetch.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Hands out append handles to the log file. A handle that cannot be cloned
/// degrades to stderr for that event instead of dropping it.
struct LogFile(File);

enum LogSink {
    File(File),
    Stderr,
}

impl Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            LogSink::File(f) => f.write(buf),
            LogSink::Stderr => io::stderr().lock().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            LogSink::File(f) => f.flush(),
            LogSink::Stderr => io::stderr().lock().flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for LogFile {
    type Writer = LogSink;

    fn make_writer(&'a self) -> Self::Writer {
        match self.0.try_clone() {
            Ok(f) => LogSink::File(f),
            Err(_) => LogSink::Stderr,
        }
    }
}

fn open_log(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))
}

/// Path of the default log file, `$XDG_STATE_HOME/nexfetch/nexfetch.log`.
pub fn log_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("nexfetch")?;
    Ok(xdg_dirs.place_state_file(LOG_FILE)?)
}

/// Install the global subscriber writing to `path`. Fails if the file cannot
/// be opened or a subscriber is already installed.
pub fn init_logging_at(path: &Path) -> Result<()> {
    let file = open_log(path)?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(LogFile(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("install log subscriber: {}", e))?;
    tracing::info!("nexfetch logging initialized at {}", path.display());
    Ok(())
}

/// Log to the default state file. On error the caller should fall back to
/// [`init_logging_stderr`].
pub fn init_logging() -> Result<()> {
    init_logging_at(&log_path()?)
}

/// Log to stderr only. A no-op if a subscriber is already installed.
pub fn init_logging_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(io::stderr)
        .with_ansi(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_is_created_and_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOG_FILE);
        std::fs::write(&path, b"earlier\n").unwrap();

        let sink = LogFile(open_log(&path).unwrap());
        let mut w = sink.make_writer();
        w.write_all(b"line\n").unwrap();
        w.flush().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "earlier\nline\n");
    }

    #[test]
    fn unopenable_log_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join(LOG_FILE);
        assert!(init_logging_at(&path).is_err());
    }
}
