use super::Config;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Read, parse and validate a configuration file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid TOML, or holds
/// out-of-range values.
pub fn parse_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config_str(&content)
}

/// Parse and validate configuration text.
///
/// # Errors
///
/// Returns an error for malformed TOML or invalid values.
pub fn parse_config_str(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse TOML config")?;

    // Validate and return validation errors directly without wrapping
    validate_config(&config)?;
    Ok(config)
}

/// Check every range constraint of a loaded configuration.
///
/// # Errors
///
/// Returns the first violated constraint.
pub fn validate_config(config: &Config) -> Result<()> {
    check_interval(config.monitor.interval_secs)?;
    check_compression_level(config.snapshot.compression_level)?;
    check_parallel_threads(config.performance.parallel_threads)?;
    if config.monitor.snapshot_file.as_os_str().is_empty() {
        anyhow::bail!("monitor.snapshot_file cannot be empty");
    }
    if config.monitor.log_file.as_os_str().is_empty() {
        anyhow::bail!("monitor.log_file cannot be empty");
    }
    if config.monitor.snapshot_file == config.monitor.log_file {
        anyhow::bail!("monitor.snapshot_file and monitor.log_file must differ");
    }
    Ok(())
}

pub(super) fn check_interval(secs: u64) -> Result<()> {
    if secs == 0 {
        anyhow::bail!("Scan interval must be at least 1 second");
    }
    Ok(())
}

pub(super) fn check_compression_level(level: i32) -> Result<()> {
    if !(1..=22).contains(&level) {
        anyhow::bail!("Compression level must be between 1 and 22");
    }
    Ok(())
}

pub(super) fn check_parallel_threads(threads: usize) -> Result<()> {
    if threads == 0 {
        anyhow::bail!("Parallel threads must be at least 1");
    }
    Ok(())
}

pub(super) fn non_empty_path(key: &str, value: &str) -> Result<PathBuf> {
    if value.trim().is_empty() {
        anyhow::bail!("{key} cannot be empty");
    }
    Ok(PathBuf::from(value))
}
