///
/// # Host Configuration
///
/// A host instance is configured from a small TOML document. Every field has
/// a default, so an empty document (or no document at all) is valid.
///
/// ## Example hostrt.toml
///
/// ```toml
/// [threads]
/// name_prefix = "lkl"
/// stack_size = 262144
///
/// [tls]
/// max_keys = 1024
///
/// [log]
/// level = "debug"
/// ```
///
/// `stack_size` is optional; when absent the substrate picks its own default.
/// `max_keys` bounds how many TLS slots one registry hands out before
/// allocation fails.
///

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Slot limit per TLS registry; matches the usual PTHREAD_KEYS_MAX.
pub const DEFAULT_MAX_TLS_KEYS: usize = 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HostConfig {
    pub threads: ThreadConfig,
    pub tls: TlsConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ThreadConfig {
    pub name_prefix: String,
    pub stack_size: Option<usize>,
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self {
            name_prefix: "hostrt".to_string(),
            stack_size: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsConfig {
    pub max_keys: usize,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            max_keys: DEFAULT_MAX_TLS_KEYS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl LogConfig {
    pub fn tracing_level(&self) -> Result<tracing::Level, ConfigError> {
        tracing::Level::from_str(&self.level)
            .map_err(|_| ConfigError::Invalid(format!("unknown log level '{}'", self.level)))
    }
}

impl HostConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tls.max_keys == 0 {
            return Err(ConfigError::Invalid("tls.max_keys must be at least 1".to_string()));
        }
        if self.threads.stack_size == Some(0) {
            return Err(ConfigError::Invalid("threads.stack_size must not be 0".to_string()));
        }
        self.log.tracing_level()?;
        Ok(())
    }
}

pub fn parse_config_str(content: &str) -> Result<HostConfig, ConfigError> {
    let config: HostConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<HostConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content)
}
