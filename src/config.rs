//! Start-up configuration.
//!
//! Loaded with figment from defaults, an optional TOML file and
//! `ATTENDANCED_`-prefixed environment variables (later sources win).

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const CONFIG_FILE_NAME: &str = "attendanced.toml";
const CONFIG_PATH_ENV: &str = "ATTENDANCED_CONFIG";
const ENV_PREFIX: &str = "ATTENDANCED_";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Workspace directory opened at start-up, if any.
    pub workspace: Option<PathBuf>,
    /// Expose store error detail in responses.
    pub diagnostics: bool,
    pub store: StoreConfig,
    pub charts: ChartsConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub database_file: String,
    pub page_size: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartsConfig {
    pub default_days: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_file: "attendance.sqlite3".to_string(),
            page_size: 100,
        }
    }
}

impl Default for ChartsConfig {
    fn default() -> Self {
        Self { default_days: 7 }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load from `ATTENDANCED_CONFIG` (or `./attendanced.toml`) and the environment.
    pub fn load() -> Result<Self> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
        Self::from_figment(Self::figment(path))
    }

    fn figment(path: PathBuf) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["CONFIG"]).split("__"))
    }

    fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.store.page_size == 0 {
            return Err(Error::ConfigValidation(
                "store.page_size must be at least 1".to_string(),
            ));
        }
        if !(1..=366).contains(&self.charts.default_days) {
            return Err(Error::ConfigValidation(
                "charts.default_days must be between 1 and 366".to_string(),
            ));
        }
        if self.store.database_file.trim().is_empty() {
            return Err(Error::ConfigValidation(
                "store.database_file must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
