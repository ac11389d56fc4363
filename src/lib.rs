#![warn(missing_docs)]
// Allow pedantic strict lints that create false positives in this codebase
#![allow(clippy::arithmetic_side_effects)] // Simple counters and size calculations cannot overflow
#![allow(clippy::float_arithmetic)] // Required for mtime conversion and size formatting

//! # Treewatch - Poll-Based Directory Change Monitor
//!
//! Treewatch watches a directory tree by scanning it on a fixed interval,
//! comparing each scan with the previous one and logging every change with a
//! timestamp. No OS notification API is involved: a change is whatever differs
//! between two fingerprints of the tree.
//!
//! ## Features
//!
//! - **Content identity**: files are fingerprinted by SHA-256 (or xxHash3) digest, size and mtime
//! - **Rename detection**: a vanished file whose identity reappears under a new name is a rename
//! - **Parallel hashing**: uses Rayon to hash files across cores
//! - **Durable snapshots**: the previous state survives restarts, as indented JSON or zstd-compressed bincode
//! - **Stable log vocabulary**: `File CREATED`, `File RENAMED`, ... lines other tools can filter
//!
//! ## Architecture
//!
//! - [`scanner`]: walks the tree and builds a [`storage::State`]
//! - [`storage`]: state types and the snapshot store
//! - [`diff`]: classifies the changes between two states
//! - [`changelog`]: event sinks, including the text change log
//! - [`monitor`]: the scan loop and its control handle
//! - [`config`]: configuration parsing and validation
//! - [`commands`]: command implementations
//! - [`output`]: output formatting and styling
//! - [`utils`]: hashing, compression, serialization and helpers
//!
//! ## Example Usage
//!
//! ```no_run
//! use treewatch::changelog::MonitorEvent;
//! use treewatch::monitor::{Monitor, MonitorOptions};
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut monitor = Monitor::new("/srv/data".as_ref(), &MonitorOptions::default())?;
//!
//! let mut events: Vec<MonitorEvent> = Vec::new();
//! let changes = monitor.run_cycle(&mut events)?;
//! for change in changes {
//!     println!("{change}");
//! }
//! # Ok(())
//! # }
//! ```

/// Change log and event sinks.
pub mod changelog;

/// Command-line interface definitions (argument parsing structures).
pub mod cli;

/// Commands module containing all CLI command implementations.
pub mod commands;

/// Configuration parsing, validation, and management.
pub mod config;

/// Change classification between two states.
pub mod diff;

/// Per-root locking so only one monitor watches a directory.
pub mod lock;

/// Scan loop and its control surface.
pub mod monitor;

/// Output formatting and styling.
pub mod output;

/// Directory tree scanning.
pub mod scanner;

/// State types and snapshot persistence.
pub mod storage;

/// Utility functions and helpers.
pub mod utils;

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Current version of the treewatch binary.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration file path relative to home directory.
pub const DEFAULT_CONFIG_PATH: &str = ".config/treewatch/config";

/// Environment variable overriding the configuration file path.
pub const CONFIG_PATH_ENV: &str = "TREEWATCH_CONFIG_PATH";

/// Default snapshot file name, inside the watched root.
pub const DEFAULT_SNAPSHOT_FILE: &str = ".monitor_states.json";

/// Default change log file name, inside the watched root.
pub const DEFAULT_LOG_FILE: &str = "log.txt";

/// Lock file name, inside the watched root.
pub const LOCK_FILE: &str = ".treewatch.lock";

/// Loaded configuration and where it came from.
///
/// # Examples
///
/// ```no_run
/// use treewatch::WatchContext;
///
/// # fn main() -> anyhow::Result<()> {
/// // Create context from the default configuration path
/// let ctx = WatchContext::new()?;
///
/// // Create context with an explicit configuration file (for testing)
/// let ctx = WatchContext::new_explicit("/tmp/test_config".into())?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct WatchContext {
    /// Path to the configuration file.
    pub config_path: PathBuf,

    /// Loaded configuration settings.
    pub config: config::Config,
}

impl WatchContext {
    /// Creates a new `WatchContext` by loading the configuration from the default path.
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined or if the configuration
    /// file cannot be read or created.
    pub fn new() -> Result<Self> {
        // Check environment variable for config path first
        let config_path = if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            PathBuf::from(path)
        } else {
            let home = dirs::home_dir().context("Could not find home directory")?;
            home.join(DEFAULT_CONFIG_PATH)
        };
        Self::new_explicit(config_path)
    }

    /// Creates a new `WatchContext` from an explicit configuration file.
    ///
    /// The file is created with defaults when missing. The hashing pool is
    /// sized from the configuration.
    ///
    /// # Errors
    /// Returns an error if the configuration cannot be loaded or created.
    pub fn new_explicit(config_path: PathBuf) -> Result<Self> {
        let config = config::Config::load(&config_path).with_context(|| {
            format!("Failed to load configuration: {}", config_path.display())
        })?;

        if let Err(e) = utils::thread_pool::init_hash_pool(config.performance.parallel_threads) {
            tracing::warn!("Failed to configure thread pool: {e}");
        }

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Monitor options derived from the configuration.
    #[must_use]
    pub fn monitor_options(&self) -> monitor::MonitorOptions {
        monitor::MonitorOptions::from_config(&self.config)
    }

    /// Configured scan interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.config.monitor.interval_secs)
    }
}
