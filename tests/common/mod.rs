#![allow(dead_code)]

use anyhow::Result;
use filetime::FileTime;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use treewatch::WatchContext;
use treewatch::monitor::{Monitor, MonitorOptions};

/// Watched directory fixture for consistent test setup
pub struct TestTree {
    pub temp_dir: TempDir,
    /// Canonical watched root, `<temp>/watched`
    pub root: PathBuf,
    pub config_path: PathBuf,
}

impl TestTree {
    /// Create an empty watched root next to a private config file
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().join("watched");
        fs::create_dir(&root)?;
        let root = root.canonicalize()?;
        let config_path = temp_dir.path().join(".config/treewatch/config");

        Ok(Self {
            temp_dir,
            root,
            config_path,
        })
    }

    /// Context reading this fixture's config file
    pub fn ctx(&self) -> Result<WatchContext> {
        WatchContext::new_explicit(self.config_path.clone())
    }

    /// Absolute path of `rel` inside the root
    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    /// Write a file, creating parent directories
    pub fn write(&self, rel: &str, content: &str) -> Result<PathBuf> {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    /// Write a file and pin its mtime to `secs` after the epoch
    pub fn write_at(&self, rel: &str, content: &str, secs: i64) -> Result<PathBuf> {
        let path = self.write(rel, content)?;
        set_mtime(&path, secs)?;
        Ok(path)
    }

    /// Create a directory and pin its mtime
    pub fn mkdir_at(&self, rel: &str, secs: i64) -> Result<PathBuf> {
        let path = self.path(rel);
        fs::create_dir_all(&path)?;
        set_mtime(&path, secs)?;
        Ok(path)
    }

    /// Monitor over this root with default options
    pub fn monitor(&self) -> Result<Monitor> {
        Ok(Monitor::new(&self.root, &MonitorOptions::default())?)
    }

    /// Read the change log, empty if it does not exist yet
    pub fn log(&self) -> String {
        fs::read_to_string(self.path("log.txt")).unwrap_or_default()
    }
}

pub fn set_mtime(path: &Path, secs: i64) -> Result<()> {
    let time = FileTime::from_unix_time(secs, 0);
    filetime::set_file_times(path, time, time)?;
    Ok(())
}

impl Default for TestTree {
    fn default() -> Self {
        Self::new().expect("Failed to create test tree")
    }
}
