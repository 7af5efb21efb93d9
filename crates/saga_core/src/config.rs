//! Configuration types for the saga engine.

use crate::error::{Result, SagaError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Repository configuration, stored at `.saga/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// State resolver configuration.
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Merge and append retry configuration.
    #[serde(default)]
    pub merge: MergeConfig,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(saga_root: &Path) -> Result<Self> {
        let path = saga_root.join("config.toml");
        if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| SagaError::ConfigError(format!("failed to read config: {}", e)))?;
            toml::from_str(&content)
                .map_err(|e| SagaError::ConfigError(format!("failed to parse config: {}", e)))
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to a file.
    pub fn save(&self, saga_root: &Path) -> Result<()> {
        let path = saga_root.join("config.toml");
        let content = toml::to_string_pretty(self)
            .map_err(|e| SagaError::ConfigError(format!("failed to serialize config: {}", e)))?;
        fs::write(&path, content)
            .map_err(|e| SagaError::ConfigError(format!("failed to write config: {}", e)))?;
        Ok(())
    }
}

/// State resolver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Maximum number of memoized snapshots (default: 256).
    pub snapshot_cache_capacity: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            snapshot_cache_capacity: 256,
        }
    }
}

/// Retry policy for head compare-and-swap races.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// How many times an append or merge retries after losing the head
    /// CAS (default: 16).
    pub max_retries: u32,

    /// Base backoff between retries in milliseconds, scaled linearly by
    /// attempt (default: 5).
    pub retry_backoff_ms: u64,
}

impl MergeConfig {
    /// Returns the base backoff as a Duration.
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            max_retries: 16,
            retry_backoff_ms: 5,
        }
    }
}
