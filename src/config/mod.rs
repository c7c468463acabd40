//! Host configuration

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::screen::{CallScreenSettings, DEFAULT_INCOMING_CALL_DURATION};

/// Application configuration
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// How long an unanswered incoming call screen stays up, in milliseconds
    pub incoming_call_duration_ms: Option<u64>,
}

impl Config {
    /// Get config directory path
    fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "callscreen", "callscreen")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from disk
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir).context("Failed to create config directory")?;

        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content).context("Failed to write config file")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    /// Effective auto-dismiss duration (defaults to 40s).
    pub fn incoming_call_duration(&self) -> Duration {
        self.incoming_call_duration_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_INCOMING_CALL_DURATION)
    }

    pub fn set_incoming_call_duration_ms(&mut self, ms: u64) {
        self.incoming_call_duration_ms = Some(ms);
    }

    /// Settings for a call screen, with an optional command line override.
    pub fn settings(&self, duration_override_ms: Option<u64>) -> CallScreenSettings {
        let incoming_call_duration = duration_override_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.incoming_call_duration());
        CallScreenSettings {
            incoming_call_duration,
        }
    }
}
