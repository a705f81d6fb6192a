//! `config.yaml`: typed settings, one struct per concern.
//!
//! Every field has a default, so a missing file or a partial file is valid.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// How long a removed entry waits for a matching create before it is
    /// deleted for good.
    pub grace_window_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            grace_window_ms: 1000,
        }
    }
}

impl SyncConfig {
    pub fn grace_window(&self) -> Duration {
        Duration::from_millis(self.grace_window_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory of the JSON tables, relative to the state directory.
    pub dir: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: "db".to_string(),
        }
    }
}

impl Config {
    /// Load `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config next to `path` as `.tmp`, then rename into place.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let yaml = serde_yaml::to_string(self)?;
        let tmp = path.with_extension("yaml.tmp");
        let io = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        std::fs::write(&tmp, yaml).map_err(io)?;
        std::fs::rename(&tmp, path).map_err(io)?;
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.store.dir.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "store.dir",
                reason: "must not be empty".into(),
            });
        }
        if Path::new(&self.store.dir).is_absolute() {
            return Err(ConfigError::Invalid {
                key: "store.dir",
                reason: "must be relative to the state directory".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_default() {
        let dir = TempDir::new().expect("tempdir");
        let config = Config::load(&dir.path().join("config.yaml")).expect("load");
        assert_eq!(config, Config::default());
        assert_eq!(config.sync.grace_window(), Duration::from_millis(1000));
        assert_eq!(config.logging.filter, "info");
        assert_eq!(config.store.dir, "db");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "sync:\n  grace_window_ms: 250\nlogging:\n  json: true\n").expect("write");

        let config = Config::load(&path).expect("load");
        assert_eq!(config.sync.grace_window_ms, 250);
        assert!(config.logging.json);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn malformed_yaml_reports_path() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "sync: [unclosed").expect("write");

        let err = Config::load(&path).expect_err("parse must fail");
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.yaml"));
    }

    #[test]
    fn absolute_store_dir_is_rejected() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "store:\n  dir: /var/db\n").expect("write");

        let err = Config::load(&path).expect_err("validation must fail");
        assert!(matches!(err, ConfigError::Invalid { key: "store.dir", .. }));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("config.yaml");
        let mut config = Config::default();
        config.sync.grace_window_ms = 42;

        config.save(&path).expect("save");
        assert!(!dir.path().join("config.yaml.tmp").exists());
        assert_eq!(Config::load(&path).expect("load"), config);
    }
}
