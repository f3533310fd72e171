//! Configuration loading for ctxvault.

use std::path::PathBuf;

use directories::{BaseDirs, ProjectDirs};
use serde::Deserialize;

use crate::chunking::ChunkSettings;
use crate::embed::EmbeddingSettings;

/// Environment variable pointing at an alternative config file.
pub const CONFIG_ENV: &str = "CTXVAULT_CONFIG";

/// Environment variable overriding the ctxvault home directory.
pub const HOME_ENV: &str = "CTXVAULT_HOME";

const DEFAULT_HOME: &str = "~/.ctxvault";

/// Top-level configuration loaded from config.toml.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Directory holding the vault registry and default vault roots.
    #[serde(default)]
    pub home: Option<String>,
    #[serde(default)]
    pub chunking: ChunkSettings,
    #[serde(default)]
    pub embedding: EmbeddingSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Configuration for diagnostic output.
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load config from `$CTXVAULT_CONFIG` or ~/.config/ctxvault/config.toml,
    /// or return defaults if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the chunking settings are invalid.
    pub fn load() -> anyhow::Result<Self> {
        let config = match Self::config_path() {
            Some(path) if path.exists() => {
                let contents = std::fs::read_to_string(&path)?;
                toml::from_str(&contents)
                    .map_err(|e| anyhow::anyhow!("Invalid config {}: {e}", path.display()))?
            }
            _ => Config::default(),
        };

        config.chunking.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        ProjectDirs::from("", "", "ctxvault").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Resolved home directory: `$CTXVAULT_HOME`, then `home` from the config
    /// file, then `~/.ctxvault`.
    #[must_use]
    pub fn home_dir(&self) -> PathBuf {
        if let Some(home) = std::env::var_os(HOME_ENV) {
            return PathBuf::from(home);
        }
        expand_tilde(self.home.as_deref().unwrap_or(DEFAULT_HOME))
    }
}

/// Expand ~ to the user's home directory.
#[must_use]
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(base_dirs) = BaseDirs::new()
    {
        return base_dirs.home_dir().join(rest);
    }
    PathBuf::from(path)
}
