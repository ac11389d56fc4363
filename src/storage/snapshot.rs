use super::State;
use crate::changelog::{EventSink, MonitorEvent, Notice};
use crate::utils::{compress, serialization};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// On-disk encoding of the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFormat {
    /// Pretty-printed JSON document with `files` and `directories` objects.
    #[default]
    Json,
    /// bincode, zstd-compressed.
    Binary,
}

impl SnapshotFormat {
    /// Configuration name of the format.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Binary => "binary",
        }
    }
}

impl std::str::FromStr for SnapshotFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "binary" => Ok(Self::Binary),
            other => Err(anyhow::anyhow!("Unknown snapshot format: {other}")),
        }
    }
}

/// Why a snapshot could not be loaded or saved.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Snapshot file.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// The file exists but does not decode to a state.
    #[error("malformed snapshot {path}: {reason}")]
    Malformed {
        /// Snapshot file.
        path: PathBuf,
        /// Decoder message.
        reason: String,
    },
    /// The state could not be encoded.
    #[error("cannot encode snapshot: {0}")]
    Encode(String),
}

/// Persists the previous [`State`] between cycles and across restarts.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
    format: SnapshotFormat,
    compression_level: i32,
}

impl SnapshotStore {
    /// Store at `path` in `format`.
    #[must_use]
    pub const fn new(path: PathBuf, format: SnapshotFormat) -> Self {
        Self {
            path,
            format,
            compression_level: 3,
        }
    }

    /// zstd level for the binary format.
    #[must_use]
    pub const fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    /// Snapshot file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the previous state.
    ///
    /// A missing snapshot is the empty state. An unreadable or malformed one
    /// is reported to `sink` and also treated as empty; this never fails.
    pub fn load(&self, sink: &mut dyn EventSink) -> State {
        match self.try_load() {
            Ok(Some(state)) => {
                tracing::debug!(
                    "loaded snapshot {} ({} files, {} directories)",
                    self.path.display(),
                    state.files.len(),
                    state.directories.len()
                );
                state
            }
            Ok(None) => State::new(),
            Err(e) => {
                tracing::warn!("{e}; starting from an empty state");
                sink.record(&MonitorEvent::Notice(Notice::SnapshotCorrupt {
                    path: self.path.clone(),
                    reason: reason_of(&e),
                }));
                State::new()
            }
        }
    }

    /// Load the previous state, distinguishing "absent" from "broken".
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot exists but cannot be read or decoded.
    pub fn try_load(&self) -> Result<Option<State>, StoreError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        self.decode(&bytes).map(Some)
    }

    /// Replace the stored snapshot with `state`.
    ///
    /// The write goes to a temporary file beside the snapshot that is then
    /// renamed over it, so a failed save leaves the previous snapshot intact.
    /// Failures are reported to `sink`; returns whether the save succeeded.
    pub fn save(&self, state: &State, sink: &mut dyn EventSink) -> bool {
        match self.try_save(state) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("{e}");
                sink.record(&MonitorEvent::Notice(Notice::SnapshotWriteFailed {
                    path: self.path.clone(),
                    reason: reason_of(&e),
                }));
                false
            }
        }
    }

    /// Replace the stored snapshot with `state`.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding, writing or the final rename fails.
    pub fn try_save(&self, state: &State) -> Result<(), StoreError> {
        let bytes = self.encode(state)?;
        let io_err = |source: io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(io_err)?;
        let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(&bytes).map_err(io_err)?;
        tmp.flush().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;

        tracing::debug!(
            "saved snapshot {} ({} bytes)",
            self.path.display(),
            bytes.len()
        );
        Ok(())
    }

    fn encode(&self, state: &State) -> Result<Vec<u8>, StoreError> {
        match self.format {
            SnapshotFormat::Json => {
                let mut out = Vec::new();
                let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
                let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
                state
                    .serialize(&mut ser)
                    .map_err(|e| StoreError::Encode(e.to_string()))?;
                Ok(out)
            }
            SnapshotFormat::Binary => {
                let raw = serialization::serialize(state)
                    .map_err(|e| StoreError::Encode(e.to_string()))?;
                compress::compress_bytes(&raw, self.compression_level)
                    .map_err(|e| StoreError::Encode(e.to_string()))
            }
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<State, StoreError> {
        let malformed = |reason: String| StoreError::Malformed {
            path: self.path.clone(),
            reason,
        };
        match self.format {
            SnapshotFormat::Json => {
                serde_json::from_slice(bytes).map_err(|e| malformed(e.to_string()))
            }
            SnapshotFormat::Binary => {
                let raw =
                    compress::decompress_bytes(bytes).map_err(|e| malformed(e.to_string()))?;
                serialization::deserialize(&raw).map_err(|e| malformed(e.to_string()))
            }
        }
    }
}

fn reason_of(err: &StoreError) -> String {
    match err {
        StoreError::Io { source, .. } => source.to_string(),
        StoreError::Malformed { reason, .. } => reason.clone(),
        StoreError::Encode(reason) => reason.clone(),
    }
}
