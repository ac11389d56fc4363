//! Scan loop: scanner, diff, sink and snapshot store, on a fixed interval.
//!
//! A [`Monitor`] owns the previous state for one root and runs single cycles.
//! [`Monitor::start`] moves it onto a worker thread and hands back a
//! [`MonitorHandle`]; the handle is the only way to talk to the running loop.
//! Commands travel over a channel, and the worker waits on that channel with
//! the interval as timeout, so a stop is seen as soon as the current scan
//! finishes instead of after a full interval. A scan is never interrupted and
//! the snapshot is replaced atomically, so stopping never leaves a
//! half-written snapshot behind.
//!
//! [`Supervisor`] is the control surface state: at most one loop per root,
//! with start and stop reported rather than silently ignored.

use crate::changelog::{EventSink, MonitorEvent, Notice};
use crate::config::Config;
use crate::diff::{self, ChangeEvent};
use crate::lock::{LockError, MonitorLock};
use crate::scanner::{ScanError, TreeScanner};
use crate::storage::State;
use crate::storage::snapshot::{SnapshotFormat, SnapshotStore};
use crate::utils::hash::DigestAlgorithm;
use crate::utils::resolve_against;
use std::collections::HashSet;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

/// Errors that end a monitor or keep one from starting.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// The root does not exist or is not a directory.
    #[error("Directory not found: {root}")]
    RootMissing {
        /// Watched root.
        root: PathBuf,
    },
    /// The root disappeared while the loop was running.
    #[error("Directory not found: {root}")]
    RootVanished {
        /// Watched root.
        root: PathBuf,
    },
    /// A loop is already running for this root.
    #[error("monitoring is already running for {root}")]
    AlreadyRunning {
        /// Watched root.
        root: PathBuf,
    },
    /// Stop or status was requested with no loop running.
    #[error("monitoring is not running")]
    NotRunning,
    /// Another process holds the root's lock.
    #[error(transparent)]
    Lock(#[from] LockError),
    /// The worker thread could not be spawned.
    #[error("cannot spawn monitor thread: {0}")]
    Spawn(#[source] io::Error),
}

/// Where a monitor keeps its bookkeeping and how it fingerprints files.
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    /// Snapshot file; relative paths resolve against the root.
    pub snapshot_file: PathBuf,
    /// Change log file; relative paths resolve against the root.
    pub log_file: PathBuf,
    /// Snapshot encoding.
    pub snapshot_format: SnapshotFormat,
    /// zstd level for the binary snapshot.
    pub compression_level: i32,
    /// Content digest.
    pub algorithm: DigestAlgorithm,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl MonitorOptions {
    /// Options taken from the loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            snapshot_file: config.monitor.snapshot_file.clone(),
            log_file: config.monitor.log_file.clone(),
            snapshot_format: config.snapshot.format,
            compression_level: config.snapshot.compression_level,
            algorithm: config.hash.algorithm,
        }
    }
}

/// How a loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit {
    /// Stopped on request.
    Stopped,
    /// A cycle failed and the loop gave up.
    Failed(String),
}

impl fmt::Display for LoopExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => f.write_str("stopped"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Messages from a [`MonitorHandle`] to its worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Stop,
    ScanNow,
}

/// One watched root and the state it was last seen in.
#[derive(Debug)]
pub struct Monitor {
    root: PathBuf,
    log_path: PathBuf,
    scanner: TreeScanner,
    store: SnapshotStore,
    /// `None` until the first cycle loads the persisted snapshot.
    previous: Option<State>,
}

impl Monitor {
    /// Monitor for `root`.
    ///
    /// The root is canonicalised; snapshot and log paths are resolved against
    /// it and excluded from every scan, together with the lock file.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::RootMissing`] if `root` is not a directory.
    pub fn new(root: &Path, options: &MonitorOptions) -> Result<Self, MonitorError> {
        let missing = || MonitorError::RootMissing {
            root: root.to_path_buf(),
        };
        if !root.is_dir() {
            return Err(missing());
        }
        let root = root.canonicalize().map_err(|_| missing())?;

        let snapshot_path = resolve_against(&root, &options.snapshot_file);
        let log_path = resolve_against(&root, &options.log_file);
        let exclude: HashSet<PathBuf> = [
            snapshot_path.clone(),
            log_path.clone(),
            MonitorLock::path_for(&root),
        ]
        .into();

        Ok(Self {
            scanner: TreeScanner::new(root.clone(), exclude, options.algorithm),
            store: SnapshotStore::new(snapshot_path, options.snapshot_format)
                .with_compression_level(options.compression_level),
            root,
            log_path,
            previous: None,
        })
    }

    /// Canonical watched root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolved change log path.
    #[must_use]
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Resolved snapshot path.
    #[must_use]
    pub fn snapshot_path(&self) -> &Path {
        self.store.path()
    }

    /// State recorded by the most recent cycle, if one has run.
    #[must_use]
    pub const fn last_state(&self) -> Option<&State> {
        self.previous.as_ref()
    }

    /// Run one scan, diff, record, save cycle.
    ///
    /// The previous state is the persisted snapshot on the first cycle and the
    /// last scanned state after that, even if saving it failed; the next
    /// cycle retries the save.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::RootVanished`] if the root can no longer be
    /// scanned. A `RootMissing` notice has been recorded by then.
    pub fn run_cycle(
        &mut self,
        sink: &mut dyn EventSink,
    ) -> Result<Vec<ChangeEvent>, MonitorError> {
        sink.record(&MonitorEvent::Notice(Notice::Monitoring {
            root: self.root.clone(),
        }));

        let report = match self.scanner.scan() {
            Ok(report) => report,
            Err(ScanError::RootUnavailable { source, .. }) => {
                tracing::error!("cannot scan {}: {source}", self.root.display());
                sink.record(&MonitorEvent::Notice(Notice::RootMissing {
                    root: self.root.clone(),
                }));
                return Err(MonitorError::RootVanished {
                    root: self.root.clone(),
                });
            }
        };

        for skipped in &report.unreadable {
            sink.record(&MonitorEvent::Notice(Notice::Unreadable {
                path: skipped.path.clone(),
            }));
        }

        let previous = match self.previous.take() {
            Some(previous) => previous,
            None => self.store.load(sink),
        };
        let changes = diff::diff(&previous, &report.state);
        for change in &changes {
            sink.record(&MonitorEvent::Change(change.clone()));
        }

        self.store.save(&report.state, sink);
        self.previous = Some(report.state);

        tracing::debug!(
            "cycle on {} produced {} changes",
            self.root.display(),
            changes.len()
        );
        Ok(changes)
    }

    /// Run the loop on a worker thread until stopped or a cycle fails.
    ///
    /// The root is locked for the lifetime of the loop. The first cycle runs
    /// immediately; `Started` is recorded once it completes.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Lock`] if another process watches this root,
    /// or [`MonitorError::Spawn`] if the thread cannot be created.
    pub fn start(
        self,
        interval: Duration,
        sink: Box<dyn EventSink>,
    ) -> Result<MonitorHandle, MonitorError> {
        let lock = MonitorLock::acquire(&self.root)?;
        let root = self.root.clone();
        let (tx, rx) = mpsc::channel();

        let thread = std::thread::Builder::new()
            .name("treewatch-monitor".to_string())
            .spawn(move || {
                let _lock = lock;
                let mut monitor = self;
                let mut sink = sink;
                let exit = monitor.run_loop(interval, &rx, &mut sink);
                if exit == LoopExit::Stopped {
                    sink.record(&MonitorEvent::Notice(Notice::Stopped));
                }
                tracing::info!("monitor for {} {exit}", monitor.root.display());
                exit
            })
            .map_err(MonitorError::Spawn)?;

        Ok(MonitorHandle {
            root,
            commands: tx,
            thread: Some(thread),
        })
    }

    fn run_loop(
        &mut self,
        interval: Duration,
        commands: &mpsc::Receiver<Command>,
        sink: &mut dyn EventSink,
    ) -> LoopExit {
        let mut first = true;
        loop {
            match self.run_cycle(sink) {
                Ok(_) => {}
                Err(e @ MonitorError::RootVanished { .. }) => {
                    return LoopExit::Failed(e.to_string());
                }
                Err(e) => {
                    sink.record(&MonitorEvent::Notice(Notice::CycleFailed {
                        reason: e.to_string(),
                    }));
                    return LoopExit::Failed(e.to_string());
                }
            }
            if first {
                sink.record(&MonitorEvent::Notice(Notice::Started));
                first = false;
            }

            match commands.recv_timeout(interval) {
                Ok(Command::ScanNow) | Err(RecvTimeoutError::Timeout) => {}
                // A dropped handle means nobody can stop us later; stop now.
                Ok(Command::Stop) | Err(RecvTimeoutError::Disconnected) => {
                    return LoopExit::Stopped;
                }
            }
        }
    }
}

/// Control handle for a running loop.
#[derive(Debug)]
pub struct MonitorHandle {
    root: PathBuf,
    commands: Sender<Command>,
    thread: Option<JoinHandle<LoopExit>>,
}

impl MonitorHandle {
    /// Watched root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the worker is still alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Ask the loop to run a cycle now instead of waiting out the interval.
    ///
    /// Returns `false` if the loop has already ended.
    pub fn scan_now(&self) -> bool {
        self.commands.send(Command::ScanNow).is_ok()
    }

    /// Ask the loop to stop after its current cycle, and wait for it.
    pub fn stop(self) -> LoopExit {
        let _ = self.commands.send(Command::Stop);
        self.join()
    }

    /// Wait for the loop to end on its own.
    pub fn join(mut self) -> LoopExit {
        match self.thread.take().map(JoinHandle::join) {
            Some(Ok(exit)) => exit,
            Some(Err(_)) => LoopExit::Failed("monitor thread panicked".to_string()),
            None => LoopExit::Stopped,
        }
    }
}

/// Start/stop bookkeeping for one root, as driven by the control surface.
#[derive(Debug)]
pub struct Supervisor {
    root: PathBuf,
    options: MonitorOptions,
    handle: Option<MonitorHandle>,
}

impl Supervisor {
    /// Supervisor for `root`; nothing runs until [`Supervisor::start`].
    #[must_use]
    pub fn new(root: PathBuf, options: MonitorOptions) -> Self {
        Self {
            root,
            options,
            handle: None,
        }
    }

    /// Whether a loop is live.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(MonitorHandle::is_running)
    }

    /// Collect a loop that ended on its own, returning how it ended.
    pub fn reap(&mut self) -> Option<LoopExit> {
        if self.handle.as_ref().is_some_and(|h| !h.is_running()) {
            return self.handle.take().map(MonitorHandle::join);
        }
        None
    }

    /// Start a loop unless one is already live.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::AlreadyRunning`] if a loop is live,
    /// [`MonitorError::RootMissing`] if the root is gone, or a lock or spawn
    /// error from [`Monitor::start`].
    pub fn start(
        &mut self,
        interval: Duration,
        sink: Box<dyn EventSink>,
    ) -> Result<(), MonitorError> {
        if self.is_running() {
            return Err(MonitorError::AlreadyRunning {
                root: self.root.clone(),
            });
        }
        self.reap();

        let monitor = Monitor::new(&self.root, &self.options)?;
        self.handle = Some(monitor.start(interval, sink)?);
        Ok(())
    }

    /// Stop the live loop and wait for it.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::NotRunning`] if no loop is live.
    pub fn stop(&mut self) -> Result<LoopExit, MonitorError> {
        if !self.is_running() {
            self.reap();
            return Err(MonitorError::NotRunning);
        }
        self.handle
            .take()
            .map(MonitorHandle::stop)
            .ok_or(MonitorError::NotRunning)
    }

    /// Run a cycle now.
    ///
    /// With a live loop the request is forwarded to it and its sink receives
    /// the events. Otherwise a one-off cycle runs here, under the root lock,
    /// reporting to `sink`.
    ///
    /// # Errors
    ///
    /// Returns the error of the one-off cycle, or a lock error if another
    /// process is watching the root.
    pub fn scan_now(
        &mut self,
        sink: &mut dyn EventSink,
    ) -> Result<Vec<ChangeEvent>, MonitorError> {
        if let Some(handle) = self.handle.as_ref()
            && handle.is_running()
            && handle.scan_now()
        {
            return Ok(Vec::new());
        }
        self.reap();

        let mut monitor = Monitor::new(&self.root, &self.options)?;
        let _lock = MonitorLock::acquire(monitor.root())?;
        monitor.run_cycle(sink)
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let exit = handle.stop();
            tracing::debug!("supervisor dropped, loop {exit}");
        }
    }
}
