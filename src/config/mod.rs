pub mod parser;

use crate::storage::snapshot::SnapshotFormat;
use crate::utils::hash::DigestAlgorithm;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Every key understood by [`Config::get`] and [`Config::set`], in display order.
pub const KEYS: &[&str] = &[
    "monitor.interval_secs",
    "monitor.snapshot_file",
    "monitor.log_file",
    "snapshot.format",
    "snapshot.compression_level",
    "hash.algorithm",
    "performance.parallel_threads",
];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub snapshot: SnapshotConfig,

    #[serde(default)]
    pub hash: HashConfig,

    #[serde(default)]
    pub performance: PerformanceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Seconds to wait between scan cycles
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Relative paths are resolved against the watched root
    #[serde(default = "default_snapshot_file")]
    pub snapshot_file: PathBuf,
    /// Relative paths are resolved against the watched root
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default)]
    pub format: SnapshotFormat,
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HashConfig {
    #[serde(default)]
    pub algorithm: DigestAlgorithm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    #[serde(default = "default_parallel_threads")]
    pub parallel_threads: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            snapshot_file: default_snapshot_file(),
            log_file: default_log_file(),
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            format: SnapshotFormat::default(),
            compression_level: default_compression_level(),
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            parallel_threads: default_parallel_threads(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Cannot create parent directories
    /// - Cannot read or parse the configuration file
    /// - Configuration file contains invalid TOML or out-of-range values
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            // Create default config if it doesn't exist
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }

        parser::parse_config_file(path)
    }

    /// Save configuration to a file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Cannot create parent directories
    /// - Cannot write to the file
    /// - TOML serialization fails
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        let mut file = std::fs::File::create(path)?;
        file.write_all(toml_str.as_bytes())?;
        Ok(())
    }

    /// Get a configuration value by key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        let (section, name) = key.split_once('.')?;

        match (section, name) {
            ("monitor", "interval_secs") => Some(self.monitor.interval_secs.to_string()),
            ("monitor", "snapshot_file") => Some(self.monitor.snapshot_file.display().to_string()),
            ("monitor", "log_file") => Some(self.monitor.log_file.display().to_string()),
            ("snapshot", "format") => Some(self.snapshot.format.as_str().to_string()),
            ("snapshot", "compression_level") => Some(self.snapshot.compression_level.to_string()),
            ("hash", "algorithm") => Some(self.hash.algorithm.as_str().to_string()),
            ("performance", "parallel_threads") => {
                Some(self.performance.parallel_threads.to_string())
            }
            _ => None,
        }
    }

    /// All keys with their current values.
    #[must_use]
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        KEYS.iter()
            .filter_map(|key| self.get(key).map(|value| (*key, value)))
            .collect()
    }

    /// Set a configuration value by key
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The key format is invalid (must be section.key)
    /// - The key is unknown
    /// - The value is invalid for the key (e.g., zero interval)
    /// - The result would point the snapshot and the log at the same file
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut candidate = self.clone();
        candidate.assign(key, value)?;
        parser::validate_config(&candidate)?;
        *self = candidate;
        Ok(())
    }

    fn assign(&mut self, key: &str, value: &str) -> Result<()> {
        let Some((section, name)) = key.split_once('.') else {
            return Err(anyhow::anyhow!("Invalid configuration key: {key}"));
        };

        match (section, name) {
            ("monitor", "interval_secs") => {
                let secs: u64 = value
                    .parse()
                    .with_context(|| format!("Invalid number: {value}"))?;
                parser::check_interval(secs)?;
                self.monitor.interval_secs = secs;
            }
            ("monitor", "snapshot_file") => {
                self.monitor.snapshot_file = parser::non_empty_path(key, value)?;
            }
            ("monitor", "log_file") => {
                self.monitor.log_file = parser::non_empty_path(key, value)?;
            }
            ("snapshot", "format") => self.snapshot.format = value.parse()?,
            ("snapshot", "compression_level") => {
                let level: i32 = value
                    .parse()
                    .with_context(|| format!("Invalid compression level: {value}"))?;
                parser::check_compression_level(level)?;
                self.snapshot.compression_level = level;
            }
            ("hash", "algorithm") => self.hash.algorithm = value.parse()?,
            ("performance", "parallel_threads") => {
                let threads: usize = value
                    .parse()
                    .with_context(|| format!("Invalid number: {value}"))?;
                parser::check_parallel_threads(threads)?;
                self.performance.parallel_threads = threads;
            }
            _ => return Err(anyhow::anyhow!("Unknown configuration key: {key}")),
        }
        Ok(())
    }

    /// Reset a configuration value to its default
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the default would collide
    /// with another setting.
    pub fn unset(&mut self, key: &str) -> Result<()> {
        let mut candidate = self.clone();
        candidate.reset(key)?;
        parser::validate_config(&candidate)?;
        *self = candidate;
        Ok(())
    }

    fn reset(&mut self, key: &str) -> Result<()> {
        let defaults = Self::default();
        let Some((section, name)) = key.split_once('.') else {
            return Err(anyhow::anyhow!("Invalid configuration key: {key}"));
        };

        match (section, name) {
            ("monitor", "interval_secs") => {
                self.monitor.interval_secs = defaults.monitor.interval_secs;
            }
            ("monitor", "snapshot_file") => {
                self.monitor.snapshot_file = defaults.monitor.snapshot_file;
            }
            ("monitor", "log_file") => self.monitor.log_file = defaults.monitor.log_file,
            ("snapshot", "format") => self.snapshot.format = defaults.snapshot.format,
            ("snapshot", "compression_level") => {
                self.snapshot.compression_level = defaults.snapshot.compression_level;
            }
            ("hash", "algorithm") => self.hash.algorithm = defaults.hash.algorithm,
            ("performance", "parallel_threads") => {
                self.performance.parallel_threads = defaults.performance.parallel_threads;
            }
            _ => return Err(anyhow::anyhow!("Unknown configuration key: {key}")),
        }
        Ok(())
    }
}

// Default functions for serde
const fn default_interval_secs() -> u64 {
    5
}

fn default_snapshot_file() -> PathBuf {
    PathBuf::from(crate::DEFAULT_SNAPSHOT_FILE)
}

fn default_log_file() -> PathBuf {
    PathBuf::from(crate::DEFAULT_LOG_FILE)
}

const fn default_compression_level() -> i32 {
    3
}

fn default_parallel_threads() -> usize {
    crate::utils::thread_pool::default_threads()
}
