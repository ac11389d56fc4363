//! Classification of the changes between two snapshots.
//!
//! [`diff`] is a pure function of a previous and a current [`State`]. It never
//! touches the filesystem and cannot fail. Events come out in a fixed order:
//!
//! 1. file renames
//! 2. file deletions
//! 3. file creations and modifications, interleaved in path order
//! 4. directory renames
//! 5. directory deletions
//! 6. directory creations
//!
//! # Rename detection
//!
//! A path that disappeared is matched against the paths that appeared. The
//! first new path (in path order) with the same identity is the candidate:
//! same digest, size and mtime for files, same mtime alone for directories.
//! The candidate only counts as a rename target when its basename differs
//! from the vanished path's basename; a same-named move is reported as a
//! deletion plus a creation. Directory identity is weak, so two unrelated
//! directories touched in the same instant can be paired up.

use crate::storage::{DirRecord, FileRecord, State};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

/// Kind of a classified change, with the literal label used in the change log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    /// `File CREATED`
    FileCreated,
    /// `File DELETED`
    FileDeleted,
    /// `File MODIFIED`
    FileModified,
    /// `File RENAMED`
    FileRenamed,
    /// `Directory CREATED`
    DirectoryCreated,
    /// `Directory DELETED`
    DirectoryDeleted,
    /// `Directory RENAMED`
    DirectoryRenamed,
}

impl ChangeKind {
    /// Every kind, in log vocabulary order.
    pub const ALL: [Self; 7] = [
        Self::FileCreated,
        Self::FileDeleted,
        Self::FileModified,
        Self::FileRenamed,
        Self::DirectoryCreated,
        Self::DirectoryDeleted,
        Self::DirectoryRenamed,
    ];

    /// Label written to the change log. Downstream tools match on these.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::FileCreated => "File CREATED",
            Self::FileDeleted => "File DELETED",
            Self::FileModified => "File MODIFIED",
            Self::FileRenamed => "File RENAMED",
            Self::DirectoryCreated => "Directory CREATED",
            Self::DirectoryDeleted => "Directory DELETED",
            Self::DirectoryRenamed => "Directory RENAMED",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One classified change between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// A file appeared that is not the target of a rename.
    FileCreated {
        /// New file.
        path: PathBuf,
        /// Its size in bytes.
        size: u64,
    },
    /// A file vanished that is not the source of a rename.
    FileDeleted {
        /// Vanished file.
        path: PathBuf,
    },
    /// A file kept its path but its digest changed.
    FileModified {
        /// Changed file.
        path: PathBuf,
    },
    /// A file's content identity moved to a path with a different basename.
    FileRenamed {
        /// Previous path.
        from: PathBuf,
        /// Current path.
        to: PathBuf,
    },
    /// A directory appeared.
    DirectoryCreated {
        /// New directory.
        path: PathBuf,
    },
    /// A directory vanished.
    DirectoryDeleted {
        /// Vanished directory.
        path: PathBuf,
    },
    /// A directory's mtime identity moved to a path with a different basename.
    DirectoryRenamed {
        /// Previous path.
        from: PathBuf,
        /// Current path.
        to: PathBuf,
    },
}

impl ChangeEvent {
    /// The event's kind.
    #[must_use]
    pub const fn kind(&self) -> ChangeKind {
        match self {
            Self::FileCreated { .. } => ChangeKind::FileCreated,
            Self::FileDeleted { .. } => ChangeKind::FileDeleted,
            Self::FileModified { .. } => ChangeKind::FileModified,
            Self::FileRenamed { .. } => ChangeKind::FileRenamed,
            Self::DirectoryCreated { .. } => ChangeKind::DirectoryCreated,
            Self::DirectoryDeleted { .. } => ChangeKind::DirectoryDeleted,
            Self::DirectoryRenamed { .. } => ChangeKind::DirectoryRenamed,
        }
    }

    /// Every path the event mentions.
    #[must_use]
    pub fn paths(&self) -> Vec<&Path> {
        match self {
            Self::FileCreated { path, .. }
            | Self::FileDeleted { path }
            | Self::FileModified { path }
            | Self::DirectoryCreated { path }
            | Self::DirectoryDeleted { path } => vec![path.as_path()],
            Self::FileRenamed { from, to } | Self::DirectoryRenamed { from, to } => {
                vec![from.as_path(), to.as_path()]
            }
        }
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.kind().label();
        match self {
            Self::FileCreated { path, size } => {
                write!(f, "{label}: {} (Size: {size} bytes)", path.display())
            }
            Self::FileDeleted { path }
            | Self::FileModified { path }
            | Self::DirectoryCreated { path }
            | Self::DirectoryDeleted { path } => write!(f, "{label}: {}", path.display()),
            Self::FileRenamed { from, to } | Self::DirectoryRenamed { from, to } => {
                write!(f, "{label}: {} -> {}", from.display(), to.display())
            }
        }
    }
}

/// Identity used to pair a vanished entry with a newly appeared one.
trait Fingerprint {
    fn basename(&self) -> &str;
    fn same_identity(&self, other: &Self) -> bool;
}

impl Fingerprint for FileRecord {
    fn basename(&self) -> &str {
        &self.basename
    }

    #[allow(clippy::float_cmp)]
    fn same_identity(&self, other: &Self) -> bool {
        self.digest == other.digest
            && self.size == other.size
            && self.modified_time == other.modified_time
    }
}

impl Fingerprint for DirRecord {
    fn basename(&self) -> &str {
        &self.basename
    }

    #[allow(clippy::float_cmp)]
    fn same_identity(&self, other: &Self) -> bool {
        self.modified_time == other.modified_time
    }
}

/// Paths of one kind of entry, split by presence in the two snapshots.
struct Partition<'a, T> {
    /// In previous, absent from current (path order).
    removed: Vec<(&'a PathBuf, &'a T)>,
    /// In current, absent from previous (path order).
    added: Vec<(&'a PathBuf, &'a T)>,
}

impl<'a, T> Partition<'a, T> {
    fn new(previous: &'a BTreeMap<PathBuf, T>, current: &'a BTreeMap<PathBuf, T>) -> Self {
        Self {
            removed: previous
                .iter()
                .filter(|(path, _)| !current.contains_key(*path))
                .collect(),
            added: current
                .iter()
                .filter(|(path, _)| !previous.contains_key(*path))
                .collect(),
        }
    }
}

impl<'a, T: Fingerprint> Partition<'a, T> {
    /// Pair removed entries with added entries, first candidate wins.
    ///
    /// An added path is claimed by at most one rename.
    fn renames(&self) -> Vec<(&'a PathBuf, &'a PathBuf)> {
        let mut claimed: HashSet<&Path> = HashSet::new();
        let mut renames = Vec::new();

        for (old_path, old) in &self.removed {
            let candidate = self
                .added
                .iter()
                .find(|(new_path, new)| {
                    !claimed.contains(new_path.as_path()) && old.same_identity(new)
                });

            if let Some((new_path, new)) = candidate
                && new.basename() != old.basename()
            {
                claimed.insert(new_path.as_path());
                renames.push((*old_path, *new_path));
            }
        }

        renames
    }
}

/// Compare two snapshots and classify every change.
///
/// `diff(s, s)` is always empty. Each path appears in at most one event.
#[must_use]
pub fn diff(previous: &State, current: &State) -> Vec<ChangeEvent> {
    let mut events = Vec::new();
    diff_files(previous, current, &mut events);
    diff_directories(previous, current, &mut events);
    events
}

fn diff_files(previous: &State, current: &State, events: &mut Vec<ChangeEvent>) {
    let partition = Partition::new(&previous.files, &current.files);
    let renames = partition.renames();
    let sources: HashSet<&Path> = renames.iter().map(|(from, _)| from.as_path()).collect();
    let targets: HashSet<&Path> = renames.iter().map(|(_, to)| to.as_path()).collect();

    events.extend(renames.iter().map(|(from, to)| ChangeEvent::FileRenamed {
        from: (*from).clone(),
        to: (*to).clone(),
    }));

    events.extend(
        partition
            .removed
            .iter()
            .filter(|(path, _)| !sources.contains(path.as_path()))
            .map(|(path, _)| ChangeEvent::FileDeleted {
                path: (*path).clone(),
            }),
    );

    for (path, record) in &current.files {
        match previous.files.get(path) {
            None if !targets.contains(path.as_path()) => {
                events.push(ChangeEvent::FileCreated {
                    path: path.clone(),
                    size: record.size,
                });
            }
            Some(old) if old.digest != record.digest => {
                events.push(ChangeEvent::FileModified { path: path.clone() });
            }
            _ => {}
        }
    }
}

fn diff_directories(previous: &State, current: &State, events: &mut Vec<ChangeEvent>) {
    let partition = Partition::new(&previous.directories, &current.directories);
    let renames = partition.renames();
    let sources: HashSet<&Path> = renames.iter().map(|(from, _)| from.as_path()).collect();
    let targets: HashSet<&Path> = renames.iter().map(|(_, to)| to.as_path()).collect();

    events.extend(
        renames
            .iter()
            .map(|(from, to)| ChangeEvent::DirectoryRenamed {
                from: (*from).clone(),
                to: (*to).clone(),
            }),
    );

    events.extend(
        partition
            .removed
            .iter()
            .filter(|(path, _)| !sources.contains(path.as_path()))
            .map(|(path, _)| ChangeEvent::DirectoryDeleted {
                path: (*path).clone(),
            }),
    );

    events.extend(
        partition
            .added
            .iter()
            .filter(|(path, _)| !targets.contains(path.as_path()))
            .map(|(path, _)| ChangeEvent::DirectoryCreated {
                path: (*path).clone(),
            }),
    );
}

/// Per-kind event counts for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSummary {
    counts: BTreeMap<ChangeKind, usize>,
}

impl DiffSummary {
    /// Count the events of one cycle.
    #[must_use]
    pub fn from_events(events: &[ChangeEvent]) -> Self {
        let mut summary = Self::default();
        for event in events {
            *summary.counts.entry(event.kind()).or_insert(0) += 1;
        }
        summary
    }

    /// Events of the given kind.
    #[must_use]
    pub fn count(&self, kind: ChangeKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    /// Events of all kinds.
    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// True when the cycle produced no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl fmt::Display for DiffSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("no changes");
        }
        let parts: Vec<String> = self
            .counts
            .iter()
            .map(|(kind, n)| format!("{n} {}", kind.label().to_lowercase()))
            .collect();
        f.write_str(&parts.join(", "))
    }
}
