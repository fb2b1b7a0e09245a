//! TOML-based application configuration.
//!
//! Stores user preferences including gamification overrides (XP per level,
//! monthly freeze allowance, freeze duration) and the default user id used
//! by the CLI when `--user` is not given.
//!
//! Configuration is stored at `~/.config/habitloom/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::error::ConfigError;
use crate::progression::GamificationConfig;

fn default_user() -> String {
    "local".to_string()
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/habitloom/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// User id assumed when the CLI is invoked without `--user`
    #[serde(default = "default_user")]
    pub default_user: String,
    #[serde(default)]
    pub gamification: GamificationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_user: default_user(),
            gamification: GamificationConfig::default(),
        }
    }
}

impl Config {
    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/habitloom"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load the configuration, falling back to defaults if the file does
    /// not exist yet.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path).map_err(|e| ConfigError::LoadFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        toml::from_str(&raw).map_err(|e| ConfigError::LoadFailed {
            path,
            message: e.to_string(),
        })
    }

    /// Persist the configuration.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let raw = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, raw).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }
}
