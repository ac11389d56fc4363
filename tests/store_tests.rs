use anyhow::Result;
use proptest::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;
use treewatch::changelog::MonitorEvent;
use treewatch::storage::snapshot::{SnapshotFormat, SnapshotStore};
use treewatch::storage::{DirRecord, FileRecord, State};

fn arb_state() -> impl Strategy<Value = State> {
    let file = (
        "[a-z]{1,8}",
        "[0-9a-f]{64}",
        any::<u64>(),
        -1.0e10f64..1.0e10f64,
    )
        .prop_map(|(name, digest, size, mtime)| {
            (
                PathBuf::from(format!("/w/{name}.dat")),
                FileRecord {
                    digest,
                    size,
                    basename: format!("{name}.dat"),
                    modified_time: mtime,
                },
            )
        });
    let dir = ("[a-z]{1,8}", 0.0f64..2.0e9).prop_map(|(name, mtime)| {
        (
            PathBuf::from(format!("/w/{name}")),
            DirRecord {
                modified_time: mtime,
                basename: name,
            },
        )
    });
    (
        prop::collection::btree_map("[a-z]{1,8}", file, 0..8),
        prop::collection::vec(dir, 0..4),
    )
        .prop_map(|(files, dirs)| State {
            files: files.into_values().collect(),
            directories: dirs.into_iter().collect(),
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_json_snapshot_round_trips(state in arb_state()) {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path().join("s.json"), SnapshotFormat::Json);
        store.try_save(&state).unwrap();
        prop_assert_eq!(store.try_load().unwrap(), Some(state));
    }

    #[test]
    fn prop_binary_snapshot_round_trips(state in arb_state()) {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path().join("s.bin"), SnapshotFormat::Binary)
            .with_compression_level(1);
        store.try_save(&state).unwrap();
        prop_assert_eq!(store.try_load().unwrap(), Some(state));
    }
}

#[test]
fn test_missing_snapshot_loads_empty() {
    let dir = TempDir::new().unwrap();
    let store = SnapshotStore::new(dir.path().join("absent.json"), SnapshotFormat::Json);
    let mut events: Vec<MonitorEvent> = Vec::new();

    assert_eq!(store.load(&mut events), State::new());
    assert!(events.is_empty());
}

#[test]
fn test_json_layout_matches_monitor_states_file() -> Result<()> {
    let dir = TempDir::new()?;
    let store = SnapshotStore::new(dir.path().join(".monitor_states.json"), SnapshotFormat::Json);
    let mut state = State::new();
    state.insert_file(
        PathBuf::from("/w/a.txt"),
        FileRecord {
            digest: "ab".repeat(32),
            size: 2,
            basename: "a.txt".to_string(),
            modified_time: 1_700_000_000.25,
        },
    );
    state.insert_directory(
        PathBuf::from("/w/sub"),
        DirRecord {
            modified_time: 1_700_000_000.5,
            basename: "sub".to_string(),
        },
    );
    store.try_save(&state)?;

    let value: serde_json::Value = serde_json::from_slice(&std::fs::read(store.path())?)?;
    let file = &value["files"]["/w/a.txt"];
    assert_eq!(file["hash"], "ab".repeat(32));
    assert_eq!(file["size"], 2);
    assert_eq!(file["basename"], "a.txt");
    assert_eq!(file["modified_time"], 1_700_000_000.25);
    assert_eq!(value["directories"]["/w/sub"]["modified"], 1_700_000_000.5);
    assert_eq!(value["directories"]["/w/sub"]["basename"], "sub");
    Ok(())
}

#[test]
fn test_snapshot_without_directories_key_loads() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("old.json");
    std::fs::write(&path, r#"{"files": {}}"#)?;
    let store = SnapshotStore::new(path, SnapshotFormat::Json);

    assert_eq!(store.try_load()?, Some(State::new()));
    Ok(())
}

#[test]
fn test_reading_json_snapshot_as_binary_is_corrupt() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("snap");
    SnapshotStore::new(path.clone(), SnapshotFormat::Json).try_save(&State::new())?;

    let mut events = Vec::new();
    let state = SnapshotStore::new(path, SnapshotFormat::Binary).load(&mut events);

    assert!(state.is_empty());
    assert_eq!(events.len(), 1);
    Ok(())
}
