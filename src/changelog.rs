//! Change log: where classified events and lifecycle notices end up.
//!
//! Producers only need [`EventSink::record`]. The text sink, [`ChangeLog`],
//! appends one line per event:
//!
//! ```text
//! [2024-05-01 12:00:00] File CREATED: /watched/a.txt (Size: 2 bytes)
//! [2024-05-01 12:00:05] File RENAMED: /watched/a.txt -> /watched/b.txt
//! [2024-05-01 12:00:10] Monitor stopped
//! ```
//!
//! Tools that filter the log match on the literal kind labels, so the
//! vocabulary in [`ChangeKind::label`] is stable. Consumers that want typed
//! events can subscribe through [`ChannelSink`] instead of parsing text.

use crate::diff::{ChangeEvent, ChangeKind};
use crate::utils::basename;
use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

/// Timestamp format inside the square brackets of a log line.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Operational messages that are not changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A scan cycle began.
    Monitoring {
        /// Watched root.
        root: PathBuf,
    },
    /// The scan loop started.
    Started,
    /// The scan loop stopped.
    Stopped,
    /// A file could not be read and was left out of the state.
    Unreadable {
        /// File that failed.
        path: PathBuf,
    },
    /// The snapshot existed but could not be loaded; starting from nothing.
    SnapshotCorrupt {
        /// Snapshot file.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },
    /// The new snapshot could not be written; the old one is untouched.
    SnapshotWriteFailed {
        /// Snapshot file.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },
    /// The watched root is gone.
    RootMissing {
        /// Watched root.
        root: PathBuf,
    },
    /// A cycle failed for another reason and the loop ended.
    CycleFailed {
        /// What went wrong.
        reason: String,
    },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Monitoring { root } => write!(f, "Monitoring: {}", root.display()),
            Self::Started => f.write_str("first scan complete. Monitoring started..."),
            Self::Stopped => f.write_str("Monitor stopped"),
            Self::Unreadable { path } => {
                write!(f, "can not access this file {}", basename(path))
            }
            Self::SnapshotCorrupt { path, reason } => {
                write!(f, "cannot load snapshot {}: {reason}", path.display())
            }
            Self::SnapshotWriteFailed { path, reason } => {
                write!(f, "cannot save snapshot {}: {reason}", path.display())
            }
            Self::RootMissing { root } => {
                write!(f, "ERROR: Directory not found: {}", root.display())
            }
            Self::CycleFailed { reason } => write!(f, "ERROR: scan cycle failed: {reason}"),
        }
    }
}

/// Anything the monitor reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    /// A classified change.
    Change(ChangeEvent),
    /// A lifecycle or error notice.
    Notice(Notice),
}

impl MonitorEvent {
    /// The change kind, if this is a change.
    #[must_use]
    pub const fn kind(&self) -> Option<ChangeKind> {
        match self {
            Self::Change(change) => Some(change.kind()),
            Self::Notice(_) => None,
        }
    }
}

impl fmt::Display for MonitorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Change(change) => change.fmt(f),
            Self::Notice(notice) => notice.fmt(f),
        }
    }
}

impl From<ChangeEvent> for MonitorEvent {
    fn from(change: ChangeEvent) -> Self {
        Self::Change(change)
    }
}

impl From<Notice> for MonitorEvent {
    fn from(notice: Notice) -> Self {
        Self::Notice(notice)
    }
}

/// Destination for monitor events.
///
/// Recording never fails from the caller's point of view: a sink that cannot
/// deliver reports the problem itself and carries on.
pub trait EventSink: Send {
    /// Deliver one event.
    fn record(&mut self, event: &MonitorEvent);
}

/// Collecting sink, used for on-demand cycles and tests.
impl EventSink for Vec<MonitorEvent> {
    fn record(&mut self, event: &MonitorEvent) {
        self.push(event.clone());
    }
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn record(&mut self, event: &MonitorEvent) {
        (**self).record(event);
    }
}

/// Format one log line for `event` at `at`.
#[must_use]
pub fn format_line(at: DateTime<Local>, event: &MonitorEvent) -> String {
    format!("[{}] {event}", at.format(TIMESTAMP_FORMAT))
}

/// Append-only text log of monitor events.
#[derive(Debug, Clone)]
pub struct ChangeLog {
    /// Log file path.
    path: PathBuf,
    /// Also print every line to stdout.
    echo: bool,
}

impl ChangeLog {
    /// Log to `path` without echoing.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path, echo: false }
    }

    /// Also print every line to stdout.
    #[must_use]
    pub const fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Log file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a single line.
    ///
    /// # Errors
    ///
    /// Returns an error if the log file cannot be opened or written.
    pub fn append(&self, line: &str) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open change log: {}", self.path.display()))?;

        writeln!(file, "{line}")?;
        file.flush()?;
        Ok(())
    }

    /// Read every line of the log back.
    ///
    /// A missing log reads as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the log exists but cannot be read.
    pub fn read_entries(&self) -> Result<Vec<LogEntry>> {
        read_entries(&self.path)
    }
}

impl EventSink for ChangeLog {
    fn record(&mut self, event: &MonitorEvent) {
        let line = format_line(Local::now(), event);
        if self.echo {
            println!("{line}");
        }
        if let Err(e) = self.append(&line) {
            tracing::error!("cannot write to change log {}: {e:#}", self.path.display());
        }
    }
}

/// Forwards typed events over a channel.
///
/// A disconnected receiver is not an error; events are dropped.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<MonitorEvent>,
}

impl ChannelSink {
    /// Forward to `tx`.
    #[must_use]
    pub const fn new(tx: Sender<MonitorEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn record(&mut self, event: &MonitorEvent) {
        if self.tx.send(event.clone()).is_err() {
            tracing::debug!("event subscriber disconnected");
        }
    }
}

/// Delivers every event to each inner sink in turn.
#[derive(Default)]
pub struct Fanout {
    sinks: Vec<Box<dyn EventSink>>,
}

impl Fanout {
    /// No sinks yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink.
    #[must_use]
    pub fn with(mut self, sink: impl EventSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl EventSink for Fanout {
    fn record(&mut self, event: &MonitorEvent) {
        for sink in &mut self.sinks {
            sink.record(event);
        }
    }
}

/// One parsed line of the change log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// When the line was written, if the prefix parsed.
    pub timestamp: Option<NaiveDateTime>,
    /// Change kind, or `None` for notices and foreign lines.
    pub kind: Option<ChangeKind>,
    /// Text after the timestamp.
    pub message: String,
    /// The line as written.
    pub raw: String,
}

impl LogEntry {
    /// Parse a log line. Lines without a timestamp prefix are kept as-is.
    #[must_use]
    pub fn from_line(line: &str) -> Self {
        let raw = line.trim_end().to_string();
        let (timestamp, message) = match raw
            .strip_prefix('[')
            .and_then(|rest| rest.split_once(']'))
        {
            Some((stamp, rest)) => (
                NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok(),
                rest.trim().to_string(),
            ),
            None => (None, raw.trim().to_string()),
        };

        let kind = ChangeKind::ALL
            .into_iter()
            .find(|kind| {
                message
                    .strip_prefix(kind.label())
                    .is_some_and(|rest| rest.starts_with(':'))
            });

        Self {
            timestamp,
            kind,
            message,
            raw,
        }
    }
}

/// Read and parse a change log. A missing file reads as empty.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn read_entries(path: &Path) -> Result<Vec<LogEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = fs::File::open(path)
        .with_context(|| format!("Failed to open change log: {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut entries = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if !line.trim().is_empty() {
            entries.push(LogEntry::from_line(&line));
        }
    }
    Ok(entries)
}

/// Count change lines per kind. Every kind is present, possibly with zero.
#[must_use]
pub fn count_by_kind(entries: &[LogEntry]) -> BTreeMap<ChangeKind, usize> {
    let mut counts: BTreeMap<ChangeKind, usize> =
        ChangeKind::ALL.into_iter().map(|kind| (kind, 0)).collect();
    for kind in entries.iter().filter_map(|e| e.kind) {
        *counts.entry(kind).or_insert(0) += 1;
    }
    counts
}
