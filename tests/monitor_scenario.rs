mod common;

use anyhow::Result;
use common::{TestTree, set_mtime};
use std::fs;
use std::path::PathBuf;
use treewatch::changelog::{MonitorEvent, Notice};
use treewatch::diff::{ChangeEvent, ChangeKind};

fn kinds(changes: &[ChangeEvent]) -> Vec<ChangeKind> {
    changes.iter().map(ChangeEvent::kind).collect()
}

#[test]
fn test_four_cycle_scenario() -> Result<()> {
    let tree = TestTree::new()?;
    let a = tree.write_at("a.txt", "hi", 1_700_000_000)?;
    let mut monitor = tree.monitor()?;
    let mut events: Vec<MonitorEvent> = Vec::new();

    // Cycle 1: nothing persisted yet, so the file is new.
    let changes = monitor.run_cycle(&mut events)?;
    assert_eq!(
        changes,
        vec![ChangeEvent::FileCreated {
            path: a.clone(),
            size: 2
        }]
    );

    // Cycle 2: untouched tree.
    assert!(monitor.run_cycle(&mut events)?.is_empty());

    // Cycle 3: content change at the same path.
    tree.write_at("a.txt", "bye", 1_700_000_100)?;
    assert_eq!(
        monitor.run_cycle(&mut events)?,
        vec![ChangeEvent::FileModified { path: a.clone() }]
    );

    // Cycle 4: same digest as the original a.txt under another name, but a
    // different mtime, so this is not a rename.
    fs::remove_file(&a)?;
    let b = tree.write_at("b.txt", "hi", 1_700_000_200)?;
    assert_eq!(
        monitor.run_cycle(&mut events)?,
        vec![
            ChangeEvent::FileDeleted { path: a },
            ChangeEvent::FileCreated { path: b, size: 2 },
        ]
    );
    Ok(())
}

#[test]
fn test_rename_keeps_identity() -> Result<()> {
    let tree = TestTree::new()?;
    let from = tree.write_at("report.txt", "quarterly numbers", 1_700_000_000)?;
    let mut monitor = tree.monitor()?;
    monitor.run_cycle(&mut Vec::new())?;

    let to = tree.path("summary.txt");
    fs::rename(&from, &to)?;
    set_mtime(&to, 1_700_000_000)?;

    let changes = monitor.run_cycle(&mut Vec::new())?;
    assert_eq!(changes, vec![ChangeEvent::FileRenamed { from, to }]);
    Ok(())
}

#[test]
fn test_same_name_move_is_delete_and_create() -> Result<()> {
    let tree = TestTree::new()?;
    let from = tree.write_at("notes.txt", "n", 1_700_000_000)?;
    tree.mkdir_at("archive", 1_600_000_000)?;
    let mut monitor = tree.monitor()?;
    monitor.run_cycle(&mut Vec::new())?;

    let to = tree.path("archive/notes.txt");
    fs::rename(&from, &to)?;
    set_mtime(&to, 1_700_000_000)?;

    let changes = monitor.run_cycle(&mut Vec::new())?;
    assert_eq!(
        kinds(&changes),
        vec![ChangeKind::FileDeleted, ChangeKind::FileCreated]
    );
    Ok(())
}

#[test]
fn test_directory_rename() -> Result<()> {
    let tree = TestTree::new()?;
    tree.mkdir_at("old", 1_650_000_000)?;
    let mut monitor = tree.monitor()?;
    monitor.run_cycle(&mut Vec::new())?;

    fs::rename(tree.path("old"), tree.path("new"))?;
    set_mtime(&tree.path("new"), 1_650_000_000)?;

    let changes = monitor.run_cycle(&mut Vec::new())?;
    assert_eq!(
        changes,
        vec![ChangeEvent::DirectoryRenamed {
            from: tree.path("old"),
            to: tree.path("new"),
        }]
    );
    Ok(())
}

#[test]
fn test_directory_create_and_delete() -> Result<()> {
    let tree = TestTree::new()?;
    tree.mkdir_at("gone", 1_650_000_000)?;
    let mut monitor = tree.monitor()?;
    monitor.run_cycle(&mut Vec::new())?;

    fs::remove_dir(tree.path("gone"))?;
    tree.mkdir_at("fresh", 1_650_000_500)?;

    let changes = monitor.run_cycle(&mut Vec::new())?;
    assert_eq!(
        changes,
        vec![
            ChangeEvent::DirectoryDeleted {
                path: tree.path("gone")
            },
            ChangeEvent::DirectoryCreated {
                path: tree.path("fresh")
            },
        ]
    );
    Ok(())
}

#[test]
fn test_bookkeeping_files_never_reported() -> Result<()> {
    let tree = TestTree::new()?;
    tree.write("a.txt", "hi")?;
    let mut monitor = tree.monitor()?;
    let mut events = Vec::new();

    monitor.run_cycle(&mut events)?;
    // The snapshot now exists, and a log line is appended by hand.
    fs::write(monitor.log_path(), "[2024-01-01 00:00:00] Monitor stopped\n")?;
    let changes = monitor.run_cycle(&mut events)?;

    assert!(changes.is_empty());
    let all_paths: Vec<PathBuf> = events
        .iter()
        .filter_map(|e| match e {
            MonitorEvent::Change(c) => Some(c.paths().into_iter().map(PathBuf::from)),
            MonitorEvent::Notice(_) => None,
        })
        .flatten()
        .collect();
    assert!(!all_paths.contains(&monitor.snapshot_path().to_path_buf()));
    assert!(!all_paths.contains(&monitor.log_path().to_path_buf()));
    Ok(())
}

#[test]
fn test_restart_resumes_from_snapshot() -> Result<()> {
    let tree = TestTree::new()?;
    tree.write_at("a.txt", "hi", 1_700_000_000)?;
    tree.monitor()?.run_cycle(&mut Vec::new())?;

    tree.write_at("b.txt", "other", 1_700_000_050)?;
    let changes = tree.monitor()?.run_cycle(&mut Vec::new())?;

    assert_eq!(
        changes,
        vec![ChangeEvent::FileCreated {
            path: tree.path("b.txt"),
            size: 5
        }]
    );
    Ok(())
}

#[test]
fn test_corrupt_snapshot_starts_over() -> Result<()> {
    let tree = TestTree::new()?;
    tree.write("a.txt", "hi")?;
    let mut first = tree.monitor()?;
    first.run_cycle(&mut Vec::new())?;
    fs::write(first.snapshot_path(), "{ \"files\": [")?;

    let mut events = Vec::new();
    let changes = tree.monitor()?.run_cycle(&mut events)?;

    assert_eq!(kinds(&changes), vec![ChangeKind::FileCreated]);
    assert!(
        events
            .iter()
            .any(|e| matches!(e, MonitorEvent::Notice(Notice::SnapshotCorrupt { .. })))
    );
    Ok(())
}
