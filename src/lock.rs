//! Per-root locking so two monitors never watch (and rewrite the snapshot of)
//! the same directory at once.
//!
//! The lock is an advisory exclusive lock on `<root>/.treewatch.lock`, held
//! for as long as the [`MonitorLock`] lives. The lock file is excluded from
//! scans.

use fs4::fs_std::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Why a root could not be locked.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// Another process already holds the lock.
    #[error(
        "another monitor is already watching this directory; remove stale lock at {path} if it is not"
    )]
    Held {
        /// Lock file.
        path: PathBuf,
    },
    /// The lock file could not be created or locked.
    #[error("cannot lock {path}: {source}")]
    Io {
        /// Lock file.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
}

/// Holds the exclusive lock on a watched root.
///
/// The lock is released and the lock file removed when this is dropped.
#[derive(Debug)]
pub struct MonitorLock {
    lock_file: File,
    lock_path: PathBuf,
}

impl MonitorLock {
    /// Lock file location for `root`.
    #[must_use]
    pub fn path_for(root: &Path) -> PathBuf {
        root.join(crate::LOCK_FILE)
    }

    /// Take the lock for `root` without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Held`] if another process holds it, or
    /// [`LockError::Io`] if the lock file cannot be created.
    pub fn acquire(root: &Path) -> Result<Self, LockError> {
        let lock_path = Self::path_for(root);
        let io_err = |source| LockError::Io {
            path: lock_path.clone(),
            source,
        };

        // Do not truncate before holding the lock: the holder's info would be lost.
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(io_err)?;

        match file.try_lock_exclusive() {
            Ok(true) => {}
            Ok(false) => return Err(LockError::Held { path: lock_path }),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                return Err(LockError::Held { path: lock_path });
            }
            Err(e) => return Err(io_err(e)),
        }

        file.set_len(0).map_err(io_err)?;
        let mut file_ref = &file;
        if let Err(e) = writeln!(
            file_ref,
            "pid={}\ntime={}",
            std::process::id(),
            humantime::format_rfc3339(SystemTime::now())
        ) {
            tracing::debug!("could not record lock holder in {}: {e}", lock_path.display());
        }
        tracing::debug!("acquired monitor lock {}", lock_path.display());

        Ok(Self {
            lock_file: file,
            lock_path,
        })
    }

    /// Lock file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for MonitorLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.lock_file);

        if let Err(e) = fs::remove_file(&self.lock_path) {
            tracing::warn!(
                "failed to remove lock file {}: {}",
                self.lock_path.display(),
                e
            );
        }
    }
}
