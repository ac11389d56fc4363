//! Tree scanner: walks a watched root and fingerprints everything under it.
//!
//! Directories are recorded with their mtime. Regular files are hashed in
//! parallel on the shared hashing pool and recorded with digest, size and
//! mtime. Files that cannot be hashed or stat'ed are left out and listed in
//! [`ScanReport::unreadable`]. Symlinks are not followed and not recorded.

use crate::storage::{DirRecord, FileRecord, State};
use crate::utils::hash::{self, DigestAlgorithm, Unreadable};
use crate::utils::{modified_secs, thread_pool};
use rayon::prelude::*;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// The scan could not look at the root at all.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Root is missing, not a directory, or cannot be listed.
    #[error("root directory unavailable: {root}: {source}")]
    RootUnavailable {
        /// Watched root.
        root: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
}

/// Result of one scan.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Fingerprint of the tree.
    pub state: State,
    /// Files left out because they could not be read, in path order.
    pub unreadable: Vec<Unreadable>,
}

/// Walks one root, skipping a fixed set of bookkeeping files.
#[derive(Debug, Clone)]
pub struct TreeScanner {
    root: PathBuf,
    exclude: HashSet<PathBuf>,
    algorithm: DigestAlgorithm,
}

impl TreeScanner {
    /// Scanner for `root` that never records any path in `exclude`.
    ///
    /// Exclusions are compared against paths built from `root`, so both
    /// should be spelled the same way (typically both canonical).
    #[must_use]
    pub fn new(root: PathBuf, exclude: HashSet<PathBuf>, algorithm: DigestAlgorithm) -> Self {
        Self {
            root,
            exclude,
            algorithm,
        }
    }

    /// Watched root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the tree and build a fresh [`State`].
    ///
    /// Entries that vanish or cannot be listed below the root are skipped;
    /// only a failure on the root itself is an error.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::RootUnavailable`] if the root is gone, is not a
    /// directory, or cannot be listed.
    pub fn scan(&self) -> Result<ScanReport, ScanError> {
        self.check_root()?;

        let mut state = State::new();
        let mut files = Vec::new();

        for entry in WalkDir::new(&self.root).follow_links(false).min_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    if e.path() == Some(self.root.as_path()) {
                        return Err(ScanError::RootUnavailable {
                            root: self.root.clone(),
                            source: e
                                .into_io_error()
                                .unwrap_or_else(|| io::Error::other("walk error at root")),
                        });
                    }
                    tracing::debug!("skipping entry during walk: {e}");
                    continue;
                }
            };

            let Some(basename) = entry.file_name().to_str().map(str::to_owned) else {
                tracing::warn!("skipping non UTF-8 path {}", entry.path().display());
                continue;
            };
            if entry.path().to_str().is_none() {
                tracing::warn!("skipping non UTF-8 path {}", entry.path().display());
                continue;
            }

            let file_type = entry.file_type();
            if file_type.is_dir() {
                // Gone between listing and stat: expected under concurrent change.
                let Ok(modified_time) = entry
                    .metadata()
                    .map_err(io::Error::from)
                    .and_then(|m| modified_secs(&m))
                else {
                    continue;
                };
                state.insert_directory(
                    entry.into_path(),
                    DirRecord {
                        modified_time,
                        basename,
                    },
                );
            } else if file_type.is_file() {
                if self.exclude.contains(entry.path()) {
                    continue;
                }
                files.push((entry.into_path(), basename));
            }
        }

        let algorithm = self.algorithm;
        let fingerprints: Vec<Result<(PathBuf, FileRecord), Unreadable>> =
            thread_pool::run_in_pool(|| {
                files
                    .into_par_iter()
                    .map(|(path, basename)| fingerprint_file(path, basename, algorithm))
                    .collect()
            });

        let mut unreadable = Vec::new();
        for result in fingerprints {
            match result {
                Ok((path, record)) => state.insert_file(path, record),
                Err(skip) => unreadable.push(skip),
            }
        }
        unreadable.sort_by(|a, b| a.path.cmp(&b.path));

        tracing::debug!(
            "scanned {}: {} files, {} directories, {} unreadable",
            self.root.display(),
            state.files.len(),
            state.directories.len(),
            unreadable.len()
        );

        Ok(ScanReport { state, unreadable })
    }

    fn check_root(&self) -> Result<(), ScanError> {
        let unavailable = |source| ScanError::RootUnavailable {
            root: self.root.clone(),
            source,
        };
        let metadata = std::fs::metadata(&self.root).map_err(unavailable)?;
        if !metadata.is_dir() {
            return Err(unavailable(io::Error::other("not a directory")));
        }
        Ok(())
    }
}

/// Hash, then stat, one file. Either failing leaves the file out entirely.
fn fingerprint_file(
    path: PathBuf,
    basename: String,
    algorithm: DigestAlgorithm,
) -> Result<(PathBuf, FileRecord), Unreadable> {
    let digest = hash::hash_file(&path, algorithm)?;

    let metadata = match std::fs::metadata(&path) {
        Ok(metadata) => metadata,
        Err(source) => {
            tracing::debug!("can not stat file {}: {source}", path.display());
            return Err(Unreadable { path, source });
        }
    };
    let modified_time = match modified_secs(&metadata) {
        Ok(secs) => secs,
        Err(source) => return Err(Unreadable { path, source }),
    };

    Ok((
        path,
        FileRecord {
            digest,
            size: metadata.len(),
            basename,
            modified_time,
        },
    ))
}

/// Scan `root` once, never recording any path in `exclude`.
///
/// # Errors
///
/// Returns [`ScanError::RootUnavailable`] if the root cannot be walked.
pub fn scan(
    root: &Path,
    exclude: &HashSet<PathBuf>,
    algorithm: DigestAlgorithm,
) -> Result<ScanReport, ScanError> {
    TreeScanner::new(root.to_path_buf(), exclude.clone(), algorithm).scan()
}
