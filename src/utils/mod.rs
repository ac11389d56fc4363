//! Utility functions and helpers.
//!
//! # Submodules
//!
//! - [`compress`]: Compression helpers
//! - [`hash`]: Streaming content digests
//! - [`serialization`]: Binary serialization
//! - [`thread_pool`]: Thread pool configuration
//!
//! # Examples
//!
//! ```
//! use treewatch::utils::{expand_tilde, format_size};
//!
//! # fn main() -> anyhow::Result<()> {
//! let path = expand_tilde("~/watched")?;
//! let size_str = format_size(1024 * 1024); // "1.00 MB"
//! # Ok(())
//! # }
//! ```

/// Compression utilities (Zstandard)
pub mod compress;
/// Content digests for change detection
pub mod hash;
/// Binary serialization utilities
pub mod serialization;
/// Thread pool configuration for parallel operations
pub mod thread_pool;

use anyhow::Result;
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Expands a path starting with `~` to the user's home directory.
///
/// # Errors
///
/// Returns an error if the path is empty.
pub fn expand_tilde(path: &str) -> Result<PathBuf> {
    if path.is_empty() {
        anyhow::bail!("Path cannot be empty");
    }
    if path.starts_with("~/")
        && let Some(home) = dirs::home_dir()
    {
        return Ok(home.join(&path[2..]));
    }
    Ok(PathBuf::from(path))
}

/// Resolve `path` against `root` unless it is already absolute.
#[must_use]
pub fn resolve_against(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Final component of `path` as a string, or empty when there is none.
#[must_use]
pub fn basename(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Seconds since the Unix epoch, fractional. Times before the epoch are negative.
#[must_use]
pub fn system_time_to_secs(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    }
}

/// Modification time of `metadata` as fractional epoch seconds.
///
/// # Errors
///
/// Returns an error if the platform does not report modification times.
pub fn modified_secs(metadata: &Metadata) -> io::Result<f64> {
    metadata.modified().map(system_time_to_secs)
}

/// Formats a file size in bytes into a human-readable string with appropriate units.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn format_size(size: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = size as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", size.round() as u64, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}
