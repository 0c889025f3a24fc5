use std::{
    env::VarError,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::ingest::DEFAULT_FILE_PREFIX;

pub const ENV_DB_PATH: &str = "CONGESTION_DB_PATH";
pub const ENV_DATA_DIR: &str = "CONGESTION_DATA_DIR";
pub const ENV_LISTEN_ADDR: &str = "CONGESTION_LISTEN_ADDR";
pub const ENV_FILE_PREFIX: &str = "CONGESTION_FILE_PREFIX";

/// Deployment settings. Immutable once loaded.
///
/// Precedence, lowest first: built-in defaults, the JSON settings file,
/// environment variables, command-line flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_path: PathBuf,
    pub data_dir: PathBuf,
    pub listen_addr: String,
    pub file_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("congestion-history.sqlite3"),
            data_dir: PathBuf::from("data"),
            listen_addr: "127.0.0.1:8000".into(),
            file_prefix: DEFAULT_FILE_PREFIX.into(),
        }
    }
}

impl Config {
    pub fn load(settings_path: Option<&Path>) -> Result<Self> {
        let mut config = match settings_path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(env)?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))
    }

    fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Result<Option<String>>,
    {
        if let Some(value) = lookup(ENV_DB_PATH)? {
            self.database_path = PathBuf::from(value);
        }
        if let Some(value) = lookup(ENV_DATA_DIR)? {
            self.data_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup(ENV_LISTEN_ADDR)? {
            self.listen_addr = value;
        }
        if let Some(value) = lookup(ENV_FILE_PREFIX)? {
            self.file_prefix = value;
        }
        Ok(())
    }

    pub fn log(&self) {
        log::info!("Database: {}", self.database_path.display());
        log::info!("Data directory: {}", self.data_dir.display());
        log::info!("Listen address: {}", self.listen_addr);
        log::debug!("Extract prefix: {}", self.file_prefix);
    }
}

fn env(name: &str) -> Result<Option<String>> {
    match std::env::var(name) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(anyhow!("{name} value is not valid unicode")),
    }
}
