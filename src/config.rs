use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::sync::{ReconcilerSettings, SchedulerSettings};

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Base URL of the LockIn API (e.g., "http://localhost:8000")
    pub api_url: String,
    /// Bearer token sent with every delivery
    pub api_key: Option<String>,
    /// Run a pass right after `lockin save` (default: true)
    pub auto_sync: bool,
    /// Seconds between scheduled passes
    pub interval_secs: u64,
    /// Seconds to wait before the first scheduled pass
    pub startup_delay_secs: u64,
    /// Upper bound on one delivery request
    pub request_timeout_secs: u64,
    /// Rejections before a record is quarantined (0 disables quarantine)
    pub quarantine_after: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            api_key: None,
            auto_sync: true,
            interval_secs: 300,
            startup_delay_secs: 60,
            request_timeout_secs: 30,
            quarantine_after: 5,
        }
    }
}

impl SyncConfig {
    pub fn reconciler_settings(&self) -> ReconcilerSettings {
        ReconcilerSettings {
            delivery_timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
            quarantine_after: self.quarantine_after,
            ..ReconcilerSettings::default()
        }
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            startup_delay: Duration::from_secs(self.startup_delay_secs),
            interval: Duration::from_secs(self.interval_secs.max(1)),
        }
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Path to the SQLite database
    pub database_path: ConfigValue<PathBuf>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
    /// Sync configuration
    pub sync: SyncConfig,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    database_path: Option<PathBuf>,
    sync: Option<SyncConfig>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let default_db_path = Self::default_data_dir().join("lockin.db");

        // Start with defaults
        let mut database_path = ConfigValue::new(default_db_path, ConfigSource::Default);
        let mut config_file = None;
        let mut sync = SyncConfig::default();

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(db_path) = file_config.database_path {
                // Resolve relative paths against config file's directory
                let resolved_path = if db_path.is_relative() {
                    path.parent().map(|p| p.join(&db_path)).unwrap_or(db_path)
                } else {
                    db_path
                };
                database_path = ConfigValue::new(resolved_path, ConfigSource::File);
            }
            if let Some(sync_config) = file_config.sync {
                sync = sync_config;
            }
        }

        // Apply environment variable overrides
        if let Ok(db_path) = std::env::var("LOCKIN_DATABASE_PATH") {
            database_path = ConfigValue::new(PathBuf::from(db_path), ConfigSource::Environment);
        }
        if let Ok(url) = std::env::var("LOCKIN_API_URL") {
            sync.api_url = url;
        }
        if let Ok(key) = std::env::var("LOCKIN_API_KEY") {
            sync.api_key = Some(key);
        }
        if let Ok(interval) = std::env::var("LOCKIN_SYNC_INTERVAL") {
            sync.interval_secs = interval
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEnv("LOCKIN_SYNC_INTERVAL", interval))?;
        }

        Ok(Self {
            database_path,
            config_file,
            sync,
        })
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/lockin/
    /// - macOS: ~/Library/Application Support/lockin/
    /// - Windows: %APPDATA%/lockin/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lockin")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/lockin/
    /// - macOS: ~/Library/Application Support/lockin/
    /// - Windows: %APPDATA%/lockin/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lockin")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    InvalidEnv(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidEnv(name, value) => {
                write!(f, "Invalid value '{}' for environment variable {}", value, name)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadError(_, e) => Some(e),
            ConfigError::ParseError(_, e) => Some(e),
            ConfigError::InvalidEnv(_, _) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.yaml");

        let config = Config::load(Some(config_path)).unwrap();
        assert!(config
            .database_path
            .value
            .to_string_lossy()
            .contains("lockin.db"));
        assert_eq!(config.database_path.source, ConfigSource::Default);
        assert!(config.config_file.is_none());
        assert_eq!(config.sync.interval_secs, 300);
        assert_eq!(config.sync.quarantine_after, 5);
        assert!(config.sync.auto_sync);
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "database_path: /custom/path/db.sqlite").unwrap();
        writeln!(file, "sync:").unwrap();
        writeln!(file, "  api_url: https://api.lockin.fit").unwrap();
        writeln!(file, "  interval_secs: 60").unwrap();
        writeln!(file, "  quarantine_after: 0").unwrap();

        let config = Config::load(Some(config_path.clone())).unwrap();
        assert_eq!(
            config.database_path.value,
            PathBuf::from("/custom/path/db.sqlite")
        );
        assert_eq!(config.database_path.source, ConfigSource::File);
        assert_eq!(config.config_file, Some(config_path));
        assert_eq!(config.sync.api_url, "https://api.lockin.fit");
        assert_eq!(config.sync.interval_secs, 60);
        assert_eq!(config.sync.quarantine_after, 0);
        // Unspecified sync fields keep their defaults
        assert_eq!(config.sync.request_timeout_secs, 30);
        assert!(config.sync.auto_sync);
    }

    #[test]
    fn test_relative_database_path_resolves_against_config_dir() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "database_path: data/lockin.db").unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(
            config.database_path.value,
            temp_dir.path().join("data/lockin.db")
        );
    }

    #[test]
    #[ignore] // Run with --ignored; env vars can pollute parallel tests
    fn test_env_var_overrides_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "database_path: /from/file.db").unwrap();

        std::env::set_var("LOCKIN_DATABASE_PATH", "/from/env.db");
        std::env::set_var("LOCKIN_SYNC_INTERVAL", "15");

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.database_path.value, PathBuf::from("/from/env.db"));
        assert_eq!(config.database_path.source, ConfigSource::Environment);
        assert_eq!(config.sync.interval_secs, 15);

        // Clean up
        std::env::remove_var("LOCKIN_DATABASE_PATH");
        std::env::remove_var("LOCKIN_SYNC_INTERVAL");
    }

    #[test]
    fn test_invalid_yaml_error() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "invalid: yaml: content: [").unwrap();

        let result = Config::load(Some(config_path));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_settings_conversion() {
        let sync = SyncConfig {
            interval_secs: 120,
            startup_delay_secs: 5,
            request_timeout_secs: 10,
            quarantine_after: 3,
            ..SyncConfig::default()
        };

        let scheduler = sync.scheduler_settings();
        assert_eq!(scheduler.interval, Duration::from_secs(120));
        assert_eq!(scheduler.startup_delay, Duration::from_secs(5));

        let reconciler = sync.reconciler_settings();
        assert_eq!(reconciler.delivery_timeout, Duration::from_secs(10));
        assert_eq!(reconciler.quarantine_after, 3);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let sync = SyncConfig {
            interval_secs: 0,
            ..SyncConfig::default()
        };
        // tokio intervals panic on a zero period
        assert_eq!(sync.scheduler_settings().interval, Duration::from_secs(1));
    }
}
