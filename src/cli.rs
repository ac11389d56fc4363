//! Command-line interface definitions for treewatch.
//!
//! This module contains all CLI argument parsing structures using clap's derive macros.
//! The CLI definitions are shared between the main binary and build tools (like xtask)
//! for man page generation.
//!
//! Note: Field-level documentation is provided via clap attributes (#[arg(help = "...")]),
//! so we allow missing_docs for this module to avoid redundant documentation.

#![allow(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// Main CLI structure for treewatch.
#[derive(Parser)]
#[command(
    name = "treewatch",
    version = crate::VERSION,
    about = "Poll-based directory change monitor",
    long_about = "Watches a directory tree by periodic scanning, classifying every change \
                  as created, deleted, modified or renamed and logging it with a timestamp"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress informational messages
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file to use instead of the default
    #[arg(long, global = true, env = "TREEWATCH_CONFIG_PATH")]
    pub config: Option<PathBuf>,
}

/// All available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Watch a directory, scanning on an interval until told to quit
    ///
    /// Reads control lines from stdin: stop, start, scan, status, quit.
    Watch {
        /// Directory to watch
        root: PathBuf,

        /// Seconds between scans (overrides monitor.interval_secs)
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Run a single scan cycle and exit
    Scan {
        /// Directory to scan
        root: PathBuf,
    },

    /// Show logged changes of one kind
    Changes {
        /// Watched directory whose log to read
        root: PathBuf,

        /// Kind of change to show
        #[arg(value_enum)]
        kind: ChangeFilter,

        /// Show directory changes instead of file changes
        #[arg(short, long)]
        dirs: bool,
    },

    /// Count logged changes per kind
    Summary {
        /// Watched directory whose log to read
        root: PathBuf,
    },

    /// Get and set options
    Config {
        /// Configuration key
        key: Option<String>,

        /// Configuration value to set
        value: Option<String>,

        /// Reset the configuration key to its default
        #[arg(long)]
        unset: bool,

        /// List all configuration values
        #[arg(short, long)]
        list: bool,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Change kinds selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChangeFilter {
    Created,
    Deleted,
    Renamed,
    Modified,
}
