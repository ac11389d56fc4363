use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use treewatch::diff::{ChangeEvent, diff};
use treewatch::storage::{DirRecord, FileRecord, State};

// Small universes so that collisions (renames, same-basename moves) are common.
const FILE_NAMES: &[&str] = &["a.txt", "b.txt", "c.txt"];
const FOLDERS: &[&str] = &["/w", "/w/sub"];
const DIR_NAMES: &[&str] = &["x", "y", "z"];

fn file_path(folder: usize, name: usize) -> PathBuf {
    Path::new(FOLDERS[folder]).join(FILE_NAMES[name])
}

fn file_entry() -> impl Strategy<Value = (PathBuf, FileRecord)> {
    (0..FOLDERS.len(), 0..FILE_NAMES.len(), 0u8..3, 0u64..2, 0u8..2).prop_map(
        |(folder, name, digest, size, mtime)| {
            (
                file_path(folder, name),
                FileRecord {
                    digest: format!("{digest:064x}"),
                    size,
                    basename: FILE_NAMES[name].to_string(),
                    modified_time: 1_700_000_000.0 + f64::from(mtime),
                },
            )
        },
    )
}

fn dir_entry() -> impl Strategy<Value = (PathBuf, DirRecord)> {
    (0..DIR_NAMES.len(), 0u8..2).prop_map(|(name, mtime)| {
        (
            Path::new("/w/dirs").join(DIR_NAMES[name]),
            DirRecord {
                modified_time: 1_600_000_000.0 + f64::from(mtime),
                basename: DIR_NAMES[name].to_string(),
            },
        )
    })
}

fn state() -> impl Strategy<Value = State> {
    (
        prop::collection::vec(file_entry(), 0..6),
        prop::collection::vec(dir_entry(), 0..4),
    )
        .prop_map(|(files, dirs)| State {
            files: files.into_iter().collect::<BTreeMap<_, _>>(),
            directories: dirs.into_iter().collect::<BTreeMap<_, _>>(),
        })
}

fn keys<T>(map: &BTreeMap<PathBuf, T>) -> BTreeSet<&Path> {
    map.keys().map(PathBuf::as_path).collect()
}

proptest! {
    #[test]
    fn prop_diff_of_identical_states_is_empty(s in state()) {
        prop_assert!(diff(&s, &s).is_empty());
    }

    #[test]
    fn prop_no_path_in_two_events(s1 in state(), s2 in state()) {
        let events = diff(&s1, &s2);
        let mut seen = BTreeSet::new();
        for event in &events {
            for path in event.paths() {
                prop_assert!(seen.insert(path.to_path_buf()), "{} reported twice", path.display());
            }
        }
    }

    #[test]
    fn prop_every_appearance_and_disappearance_is_reported(s1 in state(), s2 in state()) {
        let events = diff(&s1, &s2);
        let mut renamed_from = BTreeSet::new();
        let mut renamed_to = BTreeSet::new();
        let mut deleted = BTreeSet::new();
        let mut created = BTreeSet::new();
        for event in &events {
            match event {
                ChangeEvent::FileRenamed { from, to }
                | ChangeEvent::DirectoryRenamed { from, to } => {
                    renamed_from.insert(from.as_path());
                    renamed_to.insert(to.as_path());
                }
                ChangeEvent::FileDeleted { path } | ChangeEvent::DirectoryDeleted { path } => {
                    deleted.insert(path.as_path());
                }
                ChangeEvent::FileCreated { path, .. } | ChangeEvent::DirectoryCreated { path } => {
                    created.insert(path.as_path());
                }
                ChangeEvent::FileModified { .. } => {}
            }
        }

        let (old_files, new_files) = (keys(&s1.files), keys(&s2.files));
        let (old_dirs, new_dirs) = (keys(&s1.directories), keys(&s2.directories));
        let vanished: BTreeSet<&Path> = old_files
            .difference(&new_files)
            .chain(old_dirs.difference(&new_dirs))
            .copied()
            .collect();
        let appeared: BTreeSet<&Path> = new_files
            .difference(&old_files)
            .chain(new_dirs.difference(&old_dirs))
            .copied()
            .collect();

        let expected_deleted: BTreeSet<&Path> = vanished.difference(&renamed_from).copied().collect();
        let expected_created: BTreeSet<&Path> = appeared.difference(&renamed_to).copied().collect();
        prop_assert_eq!(deleted, expected_deleted);
        prop_assert_eq!(created, expected_created);
        prop_assert!(renamed_from.is_subset(&vanished));
        prop_assert!(renamed_to.is_subset(&appeared));
    }

    #[test]
    fn prop_modified_exactly_when_digest_changes(s1 in state(), s2 in state()) {
        let modified: BTreeSet<PathBuf> = diff(&s1, &s2)
            .into_iter()
            .filter_map(|e| match e {
                ChangeEvent::FileModified { path } => Some(path),
                _ => None,
            })
            .collect();
        let expected: BTreeSet<PathBuf> = s1
            .files
            .iter()
            .filter(|(path, old)| s2.files.get(*path).is_some_and(|new| new.digest != old.digest))
            .map(|(path, _)| path.clone())
            .collect();
        prop_assert_eq!(modified, expected);
    }

    #[test]
    fn prop_renames_preserve_basename_change(s1 in state(), s2 in state()) {
        for event in diff(&s1, &s2) {
            if let ChangeEvent::FileRenamed { from, to } = &event {
                prop_assert_ne!(from.file_name(), to.file_name());
                let (old, new) = (&s1.files[from], &s2.files[to]);
                prop_assert_eq!(&old.digest, &new.digest);
                prop_assert_eq!(old.size, new.size);
            }
        }
    }
}
