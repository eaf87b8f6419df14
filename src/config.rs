//! Configuration module for Roost

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::TimelineKind;
use crate::paths;

/// Environment variable that overrides the configured access token
pub const ACCESS_TOKEN_ENV: &str = "ROOST_ACCESS_TOKEN";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Mastodon instance to read timelines from
    #[serde(default = "default_instance")]
    pub instance: String,

    /// OAuth access token; required for the home timeline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Number of posts to fetch per request
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Background refresh interval in seconds (0 = manual only)
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Default timeline (home, local, federated, #tag, @account-id)
    #[serde(default = "default_timeline")]
    pub default_timeline: String,
}

fn default_instance() -> String {
    "mastodon.social".to_string()
}

fn default_page_size() -> usize {
    20
}

fn default_refresh_interval() -> u64 {
    0 // Manual refresh by default
}

fn default_timeline() -> String {
    "home".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            instance: default_instance(),
            access_token: None,
            page_size: default_page_size(),
            refresh_interval_secs: default_refresh_interval(),
            default_timeline: default_timeline(),
        }
    }
}

impl Config {
    /// Load config from the default path or create default
    pub fn load() -> Result<Self> {
        let path = paths::config_path()?;
        Self::load_from(&path)
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to the default path
    pub fn save(&self) -> Result<()> {
        let path = paths::config_path()?;
        self.save_to(&path)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Access token, preferring the environment over the config file
    pub fn access_token(&self) -> Option<String> {
        std::env::var(ACCESS_TOKEN_ENV)
            .ok()
            .filter(|token| !token.trim().is_empty())
            .or_else(|| self.access_token.clone())
    }

    /// Page size, never zero
    pub fn page_size(&self) -> usize {
        self.page_size.max(1)
    }

    /// Parsed default timeline, falling back to home
    pub fn default_kind(&self) -> TimelineKind {
        TimelineKind::from_str(&self.default_timeline).unwrap_or_else(|| {
            tracing::warn!(
                "Unknown default timeline '{}', using home",
                self.default_timeline
            );
            TimelineKind::Home
        })
    }
}
