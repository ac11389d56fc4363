pub mod changes;
pub mod config;
pub mod scan;
pub mod summary;
pub mod watch;

use crate::WatchContext;
use crate::utils::resolve_against;
use std::path::{Path, PathBuf};

/// Change log location for `root` under the current configuration.
///
/// The root does not need to exist any more: the log of a vanished tree may
/// still be worth reading.
#[must_use]
pub fn log_path_for(ctx: &WatchContext, root: &Path) -> PathBuf {
    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    resolve_against(&root, &ctx.config.monitor.log_file)
}
