use crate::WatchContext;
use crate::output;
use anyhow::Result;
use colored::Colorize;

/// Execute config command to get/set configuration values
///
/// # Errors
///
/// Returns an error if:
/// - Failed to set or unset configuration value
/// - Failed to save configuration
pub fn execute(
    ctx: &mut WatchContext,
    key: Option<&str>,
    value: Option<&str>,
    unset: bool,
    list: bool,
) -> Result<()> {
    // If --list flag is set or no key is provided, show all configuration
    if list || key.is_none() {
        show_all_config(ctx);
        return Ok(());
    }

    let key =
        key.ok_or_else(|| anyhow::anyhow!("Key must be provided when not using --list flag"))?;

    if unset {
        ctx.config.unset(key)?;
        ctx.config.save(&ctx.config_path)?;
        output::success(&format!("Unset {key}"));
    } else if let Some(val) = value {
        ctx.config.set(key, val)?;
        ctx.config.save(&ctx.config_path)?;
        output::success(&format!("Set {key} = {val}"));
    } else if let Some(val) = ctx.config.get(key) {
        println!("{val}");
    } else {
        anyhow::bail!("Unknown configuration key: {key}");
    }

    Ok(())
}

/// Show all configuration values grouped by section
fn show_all_config(ctx: &WatchContext) {
    let mut current_section = "";
    for (key, value) in ctx.config.entries() {
        let (section, name) = key.split_once('.').unwrap_or(("", key));
        if section != current_section {
            if !current_section.is_empty() {
                println!();
            }
            println!("{}", format!("[{section}]").bold());
            current_section = section;
        }
        println!("  {name} = {value}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_set_persists() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config");
        let mut ctx = WatchContext::new_explicit(path.clone())?;

        execute(&mut ctx, Some("monitor.interval_secs"), Some("9"), false, false)?;

        let reloaded = WatchContext::new_explicit(path)?;
        assert_eq!(reloaded.config.monitor.interval_secs, 9);
        Ok(())
    }

    #[test]
    fn test_unset_restores_default() -> Result<()> {
        let dir = tempdir()?;
        let mut ctx = WatchContext::new_explicit(dir.path().join("config"))?;

        execute(&mut ctx, Some("hash.algorithm"), Some("xxh3"), false, false)?;
        execute(&mut ctx, Some("hash.algorithm"), None, true, false)?;

        assert_eq!(ctx.config.get("hash.algorithm").as_deref(), Some("sha256"));
        Ok(())
    }

    #[test]
    fn test_unknown_key() -> Result<()> {
        let dir = tempdir()?;
        let mut ctx = WatchContext::new_explicit(dir.path().join("config"))?;

        assert!(execute(&mut ctx, Some("core.pager"), None, false, false).is_err());
        assert!(execute(&mut ctx, Some("core.pager"), Some("less"), false, false).is_err());
        Ok(())
    }
}
