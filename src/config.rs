// Engine configuration
//
// Loaded from RON (preferred) or JSON. Every field has a default so partial
// files are accepted.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_HISTORY_LIMIT: usize = 50;
pub const DEFAULT_WORKERS: usize = 3;
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 2000;

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of commands kept in history
    pub history_limit: usize,
    /// Size of the async worker pool
    pub workers: usize,
    /// How long shutdown waits for in-flight async work
    pub shutdown_grace_ms: u64,
    /// Surface internal decision points in the log
    pub debug: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            workers: DEFAULT_WORKERS,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
            debug: false,
        }
    }
}

impl EngineConfig {
    pub fn from_ron_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.ron` or `.json` file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("ron") => Self::from_ron_str(&contents),
            Some("json") => Self::from_json_str(&contents),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }

    /// `<config dir>/command_engine/engine.ron`, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("command_engine").join("engine.ron"))
    }

    /// Load from the default path, falling back to defaults if it is missing
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_limit == 0 {
            return Err(ConfigError::Invalid(
                "history_limit must be at least 1".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.history_limit, 50);
        assert_eq!(config.workers, 3);
        assert!(!config.debug);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_ron() {
        let config = EngineConfig::from_ron_str("(history_limit: 10, debug: true)").unwrap();
        assert_eq!(config.history_limit, 10);
        assert!(config.debug);
        assert_eq!(config.workers, DEFAULT_WORKERS);
    }

    #[test]
    fn test_json() {
        let config = EngineConfig::from_json_str(r#"{"workers": 5}"#).unwrap();
        assert_eq!(config.workers, 5);
        assert_eq!(config.history_limit, DEFAULT_HISTORY_LIMIT);
    }

    #[test]
    fn test_zero_history_limit_rejected() {
        let result = EngineConfig::from_ron_str("(history_limit: 0)");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("history_limit must be at least 1")
        );
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let ron_path = dir.path().join("engine.ron");
        let config = EngineConfig {
            history_limit: 7,
            ..EngineConfig::default()
        };
        std::fs::write(&ron_path, config.to_ron_string().unwrap()).unwrap();
        assert_eq!(EngineConfig::load(&ron_path).unwrap(), config);

        let txt_path = dir.path().join("engine.txt");
        std::fs::write(&txt_path, "").unwrap();
        assert!(matches!(
            EngineConfig::load(&txt_path),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }
}
