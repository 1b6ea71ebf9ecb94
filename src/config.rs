//! Service configuration, read from JSON. Every field has a default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::context::PresenceFallback;
use crate::error::ConfigError;

/// Default cadence of the cache flush cycle.
const DEFAULT_FLUSH_INTERVAL_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseConfig {
    pub kind: DatabaseKind,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub flush_interval_ms: u64,
    /// `None` waits for the primary thread indefinitely.
    pub presence_timeout_ms: Option<u64>,
    pub presence_fallback: PresenceFallback,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            presence_timeout_ms: None,
            presence_fallback: PresenceFallback::Online,
        }
    }
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.flush_interval_ms == 0 {
            return Err(ConfigError::Invalid("flushIntervalMs must be positive".to_string()));
        }
        if self.database.kind == DatabaseKind::Sqlite && self.database.path.is_none() {
            return Err(ConfigError::Invalid("sqlite database requires a path".to_string()));
        }
        Ok(())
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn presence_timeout(&self) -> Option<Duration> {
        self.presence_timeout_ms.map(Duration::from_millis)
    }
}
