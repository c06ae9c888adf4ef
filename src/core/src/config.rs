use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ImageError, Result};

/// Default upper bound for a buffered sidecar entry: 16 MiB.
pub const DEFAULT_MAX_SIDECAR_BYTES: u64 = 16 * 1024 * 1024;

/// Resolver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Largest sidecar (manifest, logo, bmap) read into memory
    pub max_sidecar_bytes: u64,

    /// Match archive image extensions ignoring ASCII case (exact by default)
    pub case_insensitive_extensions: bool,

    /// Log level
    pub log_level: LogLevel,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_sidecar_bytes: DEFAULT_MAX_SIDECAR_BYTES,
            case_insensitive_extensions: false,
            log_level: LogLevel::Warn,
        }
    }
}

impl ResolverConfig {
    /// Load configuration overrides from a YAML file.
    ///
    /// Missing keys keep their default values.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ImageError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the resolver cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.max_sidecar_bytes == 0 {
            return Err(ImageError::ConfigError(
                "max_sidecar_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}
