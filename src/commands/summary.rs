use super::log_path_for;
use crate::WatchContext;
use crate::changelog;
use crate::diff::ChangeKind;
use crate::output;
use anyhow::Result;
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::Path;

const BAR_WIDTH: usize = 40;

/// Render per-kind counts as a text table with proportional bars.
#[must_use]
pub fn render(counts: &BTreeMap<ChangeKind, usize>) -> Vec<String> {
    let max = counts.values().copied().max().unwrap_or(0);
    let label_width = ChangeKind::ALL
        .iter()
        .map(|k| k.label().len())
        .max()
        .unwrap_or(0);

    ChangeKind::ALL
        .iter()
        .map(|kind| {
            let count = counts.get(kind).copied().unwrap_or(0);
            let bar = if max == 0 { 0 } else { count * BAR_WIDTH / max };
            let pad = " ".repeat(label_width - kind.label().len());
            format!(
                "{}{pad}  {count:>6}  {}",
                output::kind_label(*kind),
                "#".repeat(bar)
            )
        })
        .collect()
}

/// Print how many changes of each kind the log of `root` holds.
///
/// # Errors
///
/// Returns an error if the log cannot be read.
pub fn execute(ctx: &WatchContext, root: &Path) -> Result<()> {
    let log_path = log_path_for(ctx, root);
    let entries = changelog::read_entries(&log_path)?;
    let counts = changelog::count_by_kind(&entries);
    let total: usize = counts.values().sum();

    println!("{}", format!("Changes logged in {}", log_path.display()).bold());
    for line in render(&counts) {
        println!("{line}");
    }
    if total == 0 {
        output::info("No changes logged yet");
    } else {
        println!("{} {total}", "Total:".bold());
    }
    Ok(())
}
