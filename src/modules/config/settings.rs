use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use log::LevelFilter;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{DEFAULT_SAVE_LATENCY_MS, DEFAULT_STORE_FILE, SESSION_KEY, USERS_KEY};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to access config file {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("config file {} is malformed: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("unknown log level '{0}'")]
    InvalidLogLevel(String),
}

/// Runtime settings for the account store and its front end.
///
/// Every field has a default, so a config file only needs the keys it changes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub store_path: PathBuf,
    pub users_key: String,
    pub session_key: String,
    pub save_latency_ms: u64, // Simulated latency of a profile save
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_FILE),
            users_key: USERS_KEY.to_string(),
            session_key: SESSION_KEY.to_string(),
            save_latency_ms: DEFAULT_SAVE_LATENCY_MS,
            log_level: "warn".to_string(),
            log_file: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from `path`, falling back to defaults if the file is absent
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        serde_json::from_reader(BufReader::new(file)).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save configuration as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let data = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, data).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save_latency(&self) -> Duration {
        Duration::from_millis(self.save_latency_ms)
    }

    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        LevelFilter::from_str(&self.log_level)
            .map_err(|_| ConfigError::InvalidLogLevel(self.log_level.clone()))
    }
}
