//! Common paths for Roost data storage
//!
//! All Roost data is stored under ~/.config/roost/ on all platforms:
//! - config.toml - User configuration
//! - roost.sqlite - Timeline cache

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// Get the Roost data directory (~/.config/roost/)
pub fn roost_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    let roost_dir = home.join(".config").join("roost");
    fs::create_dir_all(&roost_dir).context("Failed to create roost directory")?;
    Ok(roost_dir)
}

/// Get the config file path (~/.config/roost/config.toml)
pub fn config_path() -> Result<PathBuf> {
    Ok(roost_dir()?.join("config.toml"))
}

/// Get the timeline cache path (~/.config/roost/roost.sqlite)
pub fn database_path() -> Result<PathBuf> {
    Ok(roost_dir()?.join("roost.sqlite"))
}
