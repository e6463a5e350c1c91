//! Per-destination advisory lock.
//!
//! Two fetches writing the same destination would race (last writer wins and
//! one verification could read the other's bytes). Callers serialize on an
//! exclusive `flock` over a lock file keyed by the destination path. Lock files
//! live in a dedicated directory, never next to the asset, and are left in place
//! after release: deleting them would let a waiter and a newcomer lock
//! different inodes.

use crate::control::CancelToken;
use crate::error::{FetchError, Result};
use fs2::FileExt;
use md5::{Digest, Md5};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// Path of the lock file guarding `destination` inside `lock_dir`.
pub fn lock_file_path(lock_dir: &Path, destination: &Path) -> PathBuf {
    let digest = Md5::digest(destination.as_os_str().to_string_lossy().as_bytes());
    lock_dir.join(format!("{}.lock", hex::encode(digest)))
}

/// Interval between attempts while another holder has the lock.
const RETRY_INTERVAL: Duration = Duration::from_millis(100);

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// Wait until the exclusive lock for `destination` is held, polling `cancel`
/// between attempts. Returns a guard that releases the lock when dropped.
pub fn acquire(
    lock_dir: &Path,
    destination: &Path,
    cancel: &CancelToken,
) -> Result<DestinationLock> {
    fs::create_dir_all(lock_dir).map_err(|source| FetchError::Lock {
        path: lock_dir.to_path_buf(),
        source,
    })?;
    let path = lock_file_path(lock_dir, destination);
    let file = File::options()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&path)
        .map_err(|source| FetchError::Lock {
            path: path.clone(),
            source,
        })?;
    let mut waiting = false;
    loop {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        match file.try_lock_exclusive() {
            Ok(()) => return Ok(DestinationLock { file, path }),
            Err(e) if is_contended(&e) => {
                if !waiting {
                    tracing::debug!(lock = %path.display(), "destination is locked, waiting");
                    waiting = true;
                }
                thread::sleep(RETRY_INTERVAL);
            }
            Err(source) => return Err(FetchError::Lock { path, source }),
        }
    }
}

/// RAII guard for a destination lock.
#[derive(Debug)]
pub struct DestinationLock {
    file: File,
    path: PathBuf,
}

impl DestinationLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DestinationLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
