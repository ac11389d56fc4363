use super::log_path_for;
use crate::WatchContext;
use crate::changelog::{self, LogEntry};
use crate::cli::ChangeFilter;
use crate::diff::ChangeKind;
use crate::output;
use anyhow::Result;
use std::path::Path;

/// Map a command-line filter onto the logged change kind.
///
/// # Errors
///
/// Directories are never reported as modified, so that combination is refused.
pub fn kind_for(filter: ChangeFilter, dirs: bool) -> Result<ChangeKind> {
    Ok(match (filter, dirs) {
        (ChangeFilter::Created, false) => ChangeKind::FileCreated,
        (ChangeFilter::Deleted, false) => ChangeKind::FileDeleted,
        (ChangeFilter::Renamed, false) => ChangeKind::FileRenamed,
        (ChangeFilter::Modified, false) => ChangeKind::FileModified,
        (ChangeFilter::Created, true) => ChangeKind::DirectoryCreated,
        (ChangeFilter::Deleted, true) => ChangeKind::DirectoryDeleted,
        (ChangeFilter::Renamed, true) => ChangeKind::DirectoryRenamed,
        (ChangeFilter::Modified, true) => {
            anyhow::bail!("Directory modifications are not tracked")
        }
    })
}

/// Logged entries of exactly `kind`, oldest first.
#[must_use]
pub fn filter_entries(entries: &[LogEntry], kind: ChangeKind) -> Vec<&LogEntry> {
    entries.iter().filter(|e| e.kind == Some(kind)).collect()
}

/// Print every logged change of one kind for `root`.
///
/// # Errors
///
/// Returns an error if the filter is invalid or the log cannot be read.
pub fn execute(ctx: &WatchContext, root: &Path, filter: ChangeFilter, dirs: bool) -> Result<()> {
    let kind = kind_for(filter, dirs)?;
    let log_path = log_path_for(ctx, root);
    let entries = changelog::read_entries(&log_path)?;

    let matching = filter_entries(&entries, kind);
    if matching.is_empty() {
        output::info(&format!("No {} events in {}", kind.label(), log_path.display()));
        return Ok(());
    }

    for entry in matching {
        println!("{}", entry.raw);
    }
    Ok(())
}
