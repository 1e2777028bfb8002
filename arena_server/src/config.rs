//! Server configuration with defaults and TOML loading.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors raised while loading or validating a [`ServerConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// Runtime settings for the arena server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to listen on.
    pub host: String,
    /// TCP port. `0` lets the OS pick one.
    pub port: u16,
    /// Scheduler period in milliseconds (pairing + queue-position updates).
    pub tick_ms: u64,
    /// Cap on concurrently running sessions; also sizes the worker pool.
    /// `1` serializes games.
    pub max_sessions: usize,
    /// Fixed PRNG seed for draw ordering. `None` seeds from the clock.
    pub seed: Option<u64>,
    /// Default `tracing` filter, overridden by `RUST_LOG`.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 9876,
            tick_ms: 1000,
            max_sessions: 9,
            seed: None,
            log_level: "info".into(),
        }
    }
}

impl ServerConfig {
    /// Load from a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = toml::from_str(text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_ms == 0 {
            return Err(ConfigError::Invalid("tick_ms must be greater than zero"));
        }
        if self.max_sessions == 0 {
            return Err(ConfigError::Invalid("max_sessions must be greater than zero"));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}
