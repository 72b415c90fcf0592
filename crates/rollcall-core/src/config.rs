//! Application configuration management.
//!
//! Configuration is stored at `~/.config/rollcall/config.json`. Values from
//! the file can be overridden with `ROLLCALL_API_URL` and `ROLLCALL_OFFLINE`
//! (a `.env` file is honoured by the binary).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::connectivity::DEFAULT_PROBE_TIMEOUT_MS;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "rollcall";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Where the backend listens when nothing else is configured
pub const DEFAULT_API_BASE_URL: &str = "http://10.0.2.2:5000/";

const ENV_API_URL: &str = "ROLLCALL_API_URL";
const ENV_OFFLINE: &str = "ROLLCALL_OFFLINE";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    /// Treat the backend as unreachable without probing it.
    pub offline_mode: bool,
    pub probe_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            offline_mode: false,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
        }
    }
}

impl Config {
    /// Load the config file (defaults if it does not exist), then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file(&Self::config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var(ENV_API_URL).filter(|u| !u.trim().is_empty()) {
            self.api_base_url = url;
        }
        if let Some(flag) = var(ENV_OFFLINE) {
            match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => self.offline_mode = true,
                "0" | "false" | "no" | "" => self.offline_mode = false,
                other => warn!(value = other, "Ignoring unrecognised {}", ENV_OFFLINE),
            }
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the cached tables and temporary upload files.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn uploads_dir(&self) -> Result<PathBuf> {
        Ok(self.cache_dir()?.join("uploads"))
    }
}
