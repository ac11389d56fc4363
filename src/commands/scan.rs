use crate::WatchContext;
use crate::changelog::ChangeLog;
use crate::diff::DiffSummary;
use crate::lock::MonitorLock;
use crate::monitor::Monitor;
use crate::output::{self, Verbosity};
use crate::utils::format_size;
use anyhow::Result;
use std::path::Path;

/// Run one scan cycle on `root`, log its changes and exit.
///
/// # Errors
///
/// Returns an error if:
/// - The root does not exist or is not a directory
/// - Another monitor holds the root's lock
/// - The root vanishes during the scan
pub fn execute(ctx: &WatchContext, root: &Path) -> Result<()> {
    let mut monitor = Monitor::new(root, &ctx.monitor_options())?;
    let _lock = MonitorLock::acquire(monitor.root())?;

    let mut log = ChangeLog::new(monitor.log_path().to_path_buf())
        .with_echo(output::get_verbosity() != Verbosity::Quiet);
    let changes = monitor.run_cycle(&mut log)?;

    let summary = DiffSummary::from_events(&changes);
    output::info(&format!("Scan of {} complete: {summary}", monitor.root().display()));
    if let Some(state) = monitor.last_state() {
        output::verbose(&format!(
            "Tracking {} files ({}) in {} directories",
            state.files.len(),
            format_size(state.total_size()),
            state.directories.len()
        ));
    }
    Ok(())
}
