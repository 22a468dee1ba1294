//! Configuration types for har-recorder

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capture::ObserverKind;
use crate::har::Creator;
use crate::{HarError, Result};

/// Default resource lifetime in the live window
pub const DEFAULT_RESOURCE_LIFE_LIMIT_MS: u64 = 10 * 60 * 1000;

/// Default live window capacity
pub const DEFAULT_MAX_RESOURCE_COUNT: usize = 200;

/// Default recorder service queue depth
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Main configuration
///
/// Fixed at construction; nothing here can change while a recorder runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// How long a resource stays in the live window
    #[serde(default = "default_life_limit")]
    pub resource_life_limit_ms: u64,
    /// Maximum resources in the live window
    #[serde(default = "default_max_count")]
    pub max_resource_count: usize,
    /// Drop uncorrelated halves after this long; never when absent
    #[serde(default)]
    pub pending_ttl_ms: Option<u64>,
    /// Observer adapters to instantiate
    #[serde(default = "default_observers")]
    pub observers: Vec<ObserverKind>,
    /// Recorder service command queue depth
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Creator written into exported documents
    #[serde(default)]
    pub creator: Creator,
}

fn default_life_limit() -> u64 {
    DEFAULT_RESOURCE_LIFE_LIMIT_MS
}

fn default_max_count() -> usize {
    DEFAULT_MAX_RESOURCE_COUNT
}

fn default_observers() -> Vec<ObserverKind> {
    vec![ObserverKind::Xhr]
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

impl Default for Config {
    fn default() -> Self {
        Self {
            resource_life_limit_ms: DEFAULT_RESOURCE_LIFE_LIMIT_MS,
            max_resource_count: DEFAULT_MAX_RESOURCE_COUNT,
            pending_ttl_ms: None,
            observers: default_observers(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            creator: Creator::default(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| HarError::ConfigError(format!("Failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| HarError::ConfigError(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<()> {
        if self.resource_life_limit_ms == 0 {
            return Err(HarError::ConfigError(
                "resource_life_limit_ms must be > 0".to_string(),
            ));
        }

        if self.pending_ttl_ms == Some(0) {
            return Err(HarError::ConfigError(
                "pending_ttl_ms must be > 0 when set".to_string(),
            ));
        }

        if self.channel_capacity == 0 {
            return Err(HarError::ConfigError(
                "channel_capacity must be > 0".to_string(),
            ));
        }

        if self.observers.is_empty() {
            return Err(HarError::ConfigError(
                "At least one observer must be configured".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for kind in &self.observers {
            if !seen.insert(kind) {
                return Err(HarError::ConfigError(format!(
                    "Observer {kind:?} configured more than once"
                )));
            }
        }

        if self.creator.name.trim().is_empty() {
            return Err(HarError::ConfigError(
                "creator.name cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Live window lifetime
    #[must_use]
    pub fn resource_life_limit(&self) -> Duration {
        Duration::from_millis(self.resource_life_limit_ms)
    }

    /// Pending half lifetime, if bounded
    #[must_use]
    pub fn pending_ttl(&self) -> Option<Duration> {
        self.pending_ttl_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_parse() {
        let config_toml = r#"
            resource_life_limit_ms = 10000
            max_resource_count = 50
            pending_ttl_ms = 30000
            observers = ["xhr"]

            [creator]
            name = "probe"
            version = "1.0.0"
        "#;

        let config: Config = toml::from_str(config_toml).unwrap();
        assert_eq!(config.resource_life_limit(), Duration::from_secs(10));
        assert_eq!(config.max_resource_count, 50);
        assert_eq!(config.pending_ttl(), Some(Duration::from_secs(30)));
        assert_eq!(config.observers, vec![ObserverKind::Xhr]);
        assert_eq!(config.creator.name, "probe");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.resource_life_limit_ms, DEFAULT_RESOURCE_LIFE_LIMIT_MS);
        assert_eq!(config.max_resource_count, DEFAULT_MAX_RESOURCE_COUNT);
        assert!(config.pending_ttl().is_none());
        assert_eq!(config.observers, vec![ObserverKind::Xhr]);
        assert_eq!(config.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(config.creator, Creator::default());
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"max_resource_count = 0\n").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.max_resource_count, 0);
    }

    #[test]
    fn test_config_from_missing_file() {
        let result = Config::from_file(std::path::Path::new("/nonexistent/har-recorder.toml"));
        assert!(matches!(result, Err(HarError::ConfigError(_))));
    }

    #[test]
    fn test_invalid_configs() {
        let invalid = [
            "resource_life_limit_ms = 0",
            "pending_ttl_ms = 0",
            "channel_capacity = 0",
            "observers = []",
            "observers = [\"xhr\", \"xhr\"]",
            "[creator]\nname = \" \"\nversion = \"1\"",
        ];

        for toml_src in invalid {
            let config: Config = toml::from_str(toml_src).unwrap();
            assert!(config.validate().is_err(), "accepted: {toml_src}");
        }
    }

    #[test]
    fn test_unknown_observer_rejected_by_parser() {
        assert!(toml::from_str::<Config>("observers = [\"websocket\"]").is_err());
    }
}
