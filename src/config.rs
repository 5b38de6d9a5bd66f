//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::index::{SeparatorPolicy, DEFAULT_ORDER, MIN_ORDER};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Record store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String {
    dirs::data_local_dir()
        .map(|p| {
            p.join("tsindex")
                .join("climate_data.db")
                .to_string_lossy()
                .to_string()
        })
        .unwrap_or_else(|| "./climate_data.db".to_string())
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl StorageConfig {
    /// Database path with a leading `~/` expanded to the home directory
    pub fn resolved_db_path(&self) -> PathBuf {
        match (self.db_path.strip_prefix("~/"), dirs::home_dir()) {
            (Some(rest), Some(home)) => home.join(rest),
            _ => PathBuf::from(&self.db_path),
        }
    }
}

/// Timestamp index configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    /// Maximum entries per node before a split
    #[serde(default = "default_order")]
    pub order: usize,

    #[serde(default)]
    pub separator_policy: SeparatorPolicy,

    /// Replay the store into the index when opening
    #[serde(default = "default_rebuild_on_startup")]
    pub rebuild_on_startup: bool,
}

fn default_order() -> usize {
    DEFAULT_ORDER
}

fn default_rebuild_on_startup() -> bool {
    true
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            order: default_order(),
            separator_policy: SeparatorPolicy::default(),
            rebuild_on_startup: default_rebuild_on_startup(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("tsindex").join("config.toml")),
            Some(PathBuf::from("/etc/tsindex/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Reject settings the index cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.index.order < MIN_ORDER {
            return Err(ConfigError::Invalid(format!(
                "index.order must be at least {}, got {}",
                MIN_ORDER, self.index.order
            )));
        }
        Ok(())
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(db_path) = std::env::var("TSINDEX_DB_PATH") {
            self.storage.db_path = db_path;
        }

        if let Ok(order) = std::env::var("TSINDEX_INDEX_ORDER") {
            match order.parse() {
                Ok(o) => self.index.order = o,
                Err(_) => tracing::warn!("Ignoring invalid TSINDEX_INDEX_ORDER: {}", order),
            }
        }

        if let Ok(level) = std::env::var("TSINDEX_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("TSINDEX_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# tsindex Configuration
#
# Environment variables override these settings:
# - TSINDEX_DB_PATH
# - TSINDEX_INDEX_ORDER
# - TSINDEX_LOG_LEVEL
# - TSINDEX_LOG_FORMAT

[storage]
# SQLite database holding the climate readings
db_path = "~/.local/share/tsindex/climate_data.db"

[index]
# Maximum entries per B+Tree node before it splits (minimum 3)
order = 4

# What a leaf split does with the entry at the split point:
# "retain" keeps it in the right leaf, "discard" drops its record id
# (legacy behavior, loses that entry from range queries)
separator_policy = "retain"

# Rebuild the in-memory index from the database on startup
rebuild_on_startup = true

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.index.order, 4);
        assert_eq!(config.index.separator_policy, SeparatorPolicy::Retain);
        assert!(config.index.rebuild_on_startup);
        assert_eq!(config.logging.level, "info");
        assert!(config.storage.db_path.ends_with("climate_data.db"));
    }

    #[test]
    fn test_generated_config_parses() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.index.order, 4);
        assert_eq!(config.logging.format, "pretty");
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [index]
            order = 16
            separator_policy = "discard"
            "#,
        )
        .unwrap();

        assert_eq!(config.index.order, 16);
        assert_eq!(config.index.separator_policy, SeparatorPolicy::Discard);
        assert!(config.index.rebuild_on_startup);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_rejects_small_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[index]\norder = 2\n").unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_resolved_db_path() {
        let storage = StorageConfig {
            db_path: "/tmp/readings.db".to_string(),
        };
        assert_eq!(storage.resolved_db_path(), PathBuf::from("/tmp/readings.db"));

        let storage = StorageConfig {
            db_path: "~/readings.db".to_string(),
        };
        if let Some(home) = dirs::home_dir() {
            assert_eq!(storage.resolved_db_path(), home.join("readings.db"));
        }
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[index\norder = ").unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
    }
}
