//! Snapshot data model and its persistence.
//!
//! A [`State`] is the full fingerprint of a watched tree at one instant. It is
//! built fresh by the scanner every cycle, read (never mutated) by the diff
//! engine, and written wholesale by the [`snapshot::SnapshotStore`] to become
//! the "previous" state of the next cycle.

/// Loading and atomically saving the previous state.
pub mod snapshot;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Fingerprint of one regular file.
///
/// The file's absolute path is the key under which the record is stored in
/// [`State::files`]. Field names on disk match the `.monitor_states.json`
/// layout: `hash`, `size`, `basename`, `modified_time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Hex content digest.
    #[serde(rename = "hash")]
    pub digest: String,
    /// Size in bytes at scan time.
    pub size: u64,
    /// Final path component.
    pub basename: String,
    /// Modification time, seconds since the Unix epoch.
    pub modified_time: f64,
}

/// Fingerprint of one directory. Directories carry no content digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirRecord {
    /// Modification time, seconds since the Unix epoch.
    #[serde(rename = "modified")]
    pub modified_time: f64,
    /// Final path component.
    pub basename: String,
}

/// Files and directories of a watched tree, keyed by absolute path.
///
/// Ordered maps keep iteration (and therefore rename tie-breaking and
/// serialized output) independent of the order the scan visited entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Every readable regular file under the root.
    #[serde(default)]
    pub files: BTreeMap<PathBuf, FileRecord>,
    /// Every directory under the root, excluding the root itself.
    #[serde(default)]
    pub directories: BTreeMap<PathBuf, DirRecord>,
}

impl State {
    /// The empty state: nothing known.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True when neither files nor directories are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.directories.is_empty()
    }

    /// Record a file, replacing any previous record at the same path.
    pub fn insert_file(&mut self, path: PathBuf, record: FileRecord) {
        self.files.insert(path, record);
    }

    /// Record a directory, replacing any previous record at the same path.
    pub fn insert_directory(&mut self, path: PathBuf, record: DirRecord) {
        self.directories.insert(path, record);
    }

    /// Sum of recorded file sizes.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.files.values().map(|f| f.size).sum()
    }
}
