//! Metadata store configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::limits::MAX_REPLICAS;

/// Default LRU block cache size (64 MB).
pub const DEFAULT_CACHE_SIZE: usize = 64 * 1024 * 1024;
/// Default minimum replication level.
pub const DEFAULT_MIN_REPL: u32 = 2;
/// Default mandated replication level.
pub const DEFAULT_MAN_REPL: u32 = 3;
/// Default minimum time a file stays sequestered before deletion, seconds.
pub const DEFAULT_SEQUESTER_SECS: u64 = 300;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing the configuration file failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// The configuration file did not parse.
    #[error("parse error: {0}")]
    Parse(String),

    /// A field carries a value the store cannot run with.
    #[error("invalid value: {0}")]
    InvalidValue(String),
}

/// Metadata store configuration.
///
/// Replication levels are requests, not guarantees: absent or out-of-range
/// values fall back to defaults and are clamped to `[1, MAX_REPLICAS]` by
/// the accessors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    /// Path of the database directory.
    pub path: PathBuf,
    /// LRU block cache size in bytes.
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
    /// Whether to create the database if it doesn't exist.
    #[serde(default = "default_create")]
    pub create_if_missing: bool,
    /// Minimum replication level.
    #[serde(default)]
    pub min_repl: Option<u32>,
    /// Mandated replication level.
    #[serde(default)]
    pub man_repl: Option<u32>,
    /// Minimum time a file stays sequestered before deletion, seconds.
    #[serde(default)]
    pub min_sequester_secs: Option<u64>,
}

fn default_cache_size() -> usize {
    DEFAULT_CACHE_SIZE
}

fn default_create() -> bool {
    true
}

/// Clamps a configured replication level into `[1, MAX_REPLICAS]`,
/// falling back to `default` when absent or zero.
fn valid_repl(configured: Option<u32>, default: u32) -> u32 {
    match configured {
        None | Some(0) => default,
        Some(n) if n as usize > MAX_REPLICAS => MAX_REPLICAS as u32,
        Some(n) => n,
    }
}

impl MetaConfig {
    /// Creates a configuration for the given database path with defaults.
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            cache_size: DEFAULT_CACHE_SIZE,
            create_if_missing: true,
            min_repl: None,
            man_repl: None,
            min_sequester_secs: None,
        }
    }

    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: Self =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue("path cannot be empty".into()));
        }
        if self.cache_size == 0 {
            return Err(ConfigError::InvalidValue(
                "cache_size cannot be 0".into(),
            ));
        }
        if self.min_repl() > self.man_repl() {
            return Err(ConfigError::InvalidValue(format!(
                "min_repl {} exceeds man_repl {}",
                self.min_repl(),
                self.man_repl()
            )));
        }
        Ok(())
    }

    /// The effective minimum replication level.
    #[must_use]
    pub fn min_repl(&self) -> u32 {
        valid_repl(self.min_repl, DEFAULT_MIN_REPL)
    }

    /// The effective mandated replication level.
    #[must_use]
    pub fn man_repl(&self) -> u32 {
        valid_repl(self.man_repl, DEFAULT_MAN_REPL)
    }

    /// The effective minimum sequester time, seconds.
    #[must_use]
    pub fn min_sequester_secs(&self) -> u64 {
        self.min_sequester_secs.unwrap_or(DEFAULT_SEQUESTER_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MetaConfig::with_path("/tmp/meta");
        assert_eq!(config.cache_size, DEFAULT_CACHE_SIZE);
        assert!(config.create_if_missing);
        assert_eq!(config.min_repl(), DEFAULT_MIN_REPL);
        assert_eq!(config.man_repl(), DEFAULT_MAN_REPL);
        assert_eq!(config.min_sequester_secs(), DEFAULT_SEQUESTER_SECS);
        config.validate().unwrap();
    }

    #[test]
    fn test_repl_clamping() {
        let mut config = MetaConfig::with_path("/tmp/meta");
        config.min_repl = Some(0);
        config.man_repl = Some(100);
        assert_eq!(config.min_repl(), DEFAULT_MIN_REPL);
        assert_eq!(config.man_repl(), MAX_REPLICAS as u32);

        config.min_repl = Some(3);
        config.man_repl = Some(3);
        assert_eq!(config.min_repl(), 3);
        assert_eq!(config.man_repl(), 3);
    }

    #[test]
    fn test_validate_rejects_inverted_repl() {
        let mut config = MetaConfig::with_path("/tmp/meta");
        config.min_repl = Some(5);
        config.man_repl = Some(2);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_toml_roundtrip() {
        let toml = r#"
            path = "/var/lib/shoalfs/meta"
            cache_size = 1048576
            man_repl = 2
        "#;
        let config: MetaConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.path, PathBuf::from("/var/lib/shoalfs/meta"));
        assert_eq!(config.cache_size, 1_048_576);
        assert_eq!(config.man_repl(), 2);
        assert_eq!(config.min_repl(), 2);
    }
}
