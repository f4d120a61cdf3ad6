//! Engine configuration
//!
//! Tuning knobs for one deployment, loaded from a YAML file with every
//! field optional. Collaborator endpoints (storage, credentials,
//! notification) are wired in code, not configured here.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Engine-wide settings with deployment defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Parallel-stage worker pool size.
    pub workers: usize,
    /// Auto-detection rounds before giving up.
    pub detect_attempts: u32,
    /// Pause between detection rounds, in milliseconds.
    pub detect_pause_ms: u64,
    /// Family to fall back to when exact and live resolution both miss.
    pub fallback_family: Option<String>,
    /// Pinned portal version; unset means live detection.
    pub portal_version: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            detect_attempts: 3,
            detect_pause_ms: 1500,
            fallback_family: None,
            portal_version: None,
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_yaml_str(&std::fs::read_to_string(path)?)
    }

    pub fn detect_pause(&self) -> Duration {
        Duration::from_millis(self.detect_pause_ms)
    }
}
