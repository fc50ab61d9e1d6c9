//! Configuration management for splitlog

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::logging::{LogConfig, RotationPolicy, Severity, DEFAULT_FILTER, DEFAULT_SUFFIX_FORMAT};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Directory holding partitions and aliases for both bands
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Base name for events below the threshold (default: access.log)
    #[serde(default = "default_normal_log_name")]
    pub normal_log_name: String,

    /// Base name for events at or above the threshold (default: error.log)
    #[serde(default = "default_elevated_log_name")]
    pub elevated_log_name: String,

    /// Lowest severity routed to the elevated log (default: warn)
    #[serde(default = "default_threshold")]
    pub threshold: Severity,

    /// Partition width in seconds (default: 3600 = 1 hour)
    #[serde(default = "default_rotation_secs")]
    pub rotation_secs: u64,

    /// Partitions older than this many seconds are pruned (default: 604800 = 7 days)
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,

    /// strftime pattern appended to partition names (default: %Y%m%d%H)
    #[serde(default = "default_suffix_format")]
    pub suffix_format: String,

    /// Filter directives used when RUST_LOG is unset
    #[serde(default = "default_env_filter")]
    pub env_filter: String,

    /// Path of the process marker file
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,
}

fn default_log_dir() -> PathBuf {
    logs_dir()
}

fn default_normal_log_name() -> String {
    "access.log".to_string()
}

fn default_elevated_log_name() -> String {
    "error.log".to_string()
}

fn default_threshold() -> Severity {
    Severity::Warn
}

fn default_rotation_secs() -> u64 {
    60 * 60
}

fn default_retention_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_suffix_format() -> String {
    DEFAULT_SUFFIX_FORMAT.to_string()
}

fn default_env_filter() -> String {
    DEFAULT_FILTER.to_string()
}

fn default_pid_file() -> PathBuf {
    config_dir().join("running.pid")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            normal_log_name: default_normal_log_name(),
            elevated_log_name: default_elevated_log_name(),
            threshold: default_threshold(),
            rotation_secs: default_rotation_secs(),
            retention_secs: default_retention_secs(),
            suffix_format: default_suffix_format(),
            env_filter: default_env_filter(),
            pid_file: default_pid_file(),
        }
    }
}

impl Config {
    /// Load configuration from the default file, or return default if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from `path`, or return default if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_file_path())
    }

    /// Save configuration to `path`, creating its directory if needed
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Build the validated pipeline settings
    pub fn log_config(&self) -> Result<LogConfig> {
        let policy = |name: &str| {
            RotationPolicy::new(&self.log_dir, name)
                .with_bucket(Duration::from_secs(self.rotation_secs))
                .with_retention(Duration::from_secs(self.retention_secs))
                .with_suffix_format(&self.suffix_format)
        };

        let config = LogConfig {
            threshold: self.threshold,
            normal: policy(&self.normal_log_name),
            elevated: policy(&self.elevated_log_name),
            default_filter: self.env_filter.clone(),
        };
        config.validate().context("Invalid logging configuration")?;
        Ok(config)
    }

    /// Ensure the log directory and the pid file's directory exist
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.log_dir).context("Failed to create logs directory")?;

        if let Some(parent) = self.pid_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("Failed to create pid file directory")?;
        }

        Ok(())
    }
}

/// Get the base configuration directory (~/.splitlog)
/// Falls back to ./.splitlog if home directory cannot be determined
pub fn config_dir() -> PathBuf {
    try_config_dir().unwrap_or_else(|| PathBuf::from(".splitlog"))
}

/// Try to get the base configuration directory, returning None if home dir is unavailable
pub fn try_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".splitlog"))
}

/// Get the path to the config file
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Get the path to the logs directory
pub fn logs_dir() -> PathBuf {
    config_dir().join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::Band;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.normal_log_name, "access.log");
        assert_eq!(config.elevated_log_name, "error.log");
        assert_eq!(config.threshold, Severity::Warn);
        assert_eq!(config.rotation_secs, 3600);
        assert_eq!(config.retention_secs, 604_800);
        assert!(config.pid_file.ends_with("running.pid"));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            log_dir = "/srv/app/logs"
            threshold = "error"
            retention_secs = 86400
            "#,
        )
        .unwrap();
        assert_eq!(parsed.log_dir, PathBuf::from("/srv/app/logs"));
        assert_eq!(parsed.threshold, Severity::Error);
        assert_eq!(parsed.retention_secs, 86_400);
        assert_eq!(parsed.rotation_secs, 3600);
        assert_eq!(parsed.normal_log_name, "access.log");
    }

    #[test]
    fn test_config_dir_does_not_panic() {
        let dir = config_dir();
        assert!(dir.ends_with(".splitlog"));
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load_from(&temp_dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".splitlog").join("config.toml");

        let config = Config {
            log_dir: temp_dir.path().join("logs"),
            threshold: Severity::Info,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "threshold = \"loud\"").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_log_config_from_defaults() {
        let log_config = Config::default().log_config().unwrap();
        assert_eq!(log_config.threshold, Severity::Warn);
        assert_eq!(log_config.policy(Band::Normal).name(), "access.log");
        assert_eq!(log_config.policy(Band::Elevated).name(), "error.log");
        assert_eq!(
            log_config.policy(Band::Normal).bucket(),
            Duration::from_secs(3600)
        );
    }

    #[test]
    fn test_log_config_rejects_invalid_values() {
        let zero_rotation = Config {
            rotation_secs: 0,
            ..Config::default()
        };
        assert!(zero_rotation.log_config().is_err());

        let same_names = Config {
            elevated_log_name: "access.log".to_string(),
            ..Config::default()
        };
        assert!(same_names.log_config().is_err());
    }

    #[test]
    fn test_ensure_directories() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            log_dir: temp_dir.path().join("a").join("logs"),
            pid_file: temp_dir.path().join("run").join("running.pid"),
            ..Config::default()
        };
        config.ensure_directories().unwrap();
        assert!(config.log_dir.is_dir());
        assert!(temp_dir.path().join("run").is_dir());
    }
}
