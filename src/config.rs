// Recommender Configuration
//
// Exploration strength, flush batch size, and the locations of the
// persisted model and the top-N categorical artifact.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const ENV_ALPHA: &str = "BOOKBANDIT_ALPHA";
pub const ENV_BATCH_SIZE: &str = "BOOKBANDIT_BATCH_SIZE";
pub const ENV_MODEL_PATH: &str = "BOOKBANDIT_MODEL_PATH";
pub const ENV_ITEM_CONFIG: &str = "BOOKBANDIT_ITEM_CONFIG";

const MAX_BATCH_SIZE: usize = 10_000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Runtime configuration for the bandit core
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecommenderConfig {
    /// UCB exploration weight
    pub alpha: f64,

    /// Number of buffered feedback samples that triggers a flush
    pub batch_size: usize,

    /// Persisted bank state (JSON)
    pub model_path: PathBuf,

    /// Top-N categorical artifact (JSON)
    pub item_config_path: PathBuf,
}

/// Base data directory using the XDG data-local standard
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bookbandit")
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            alpha: 0.5,
            batch_size: 5,
            model_path: data_dir.join("models").join("linucb_model.json"),
            item_config_path: data_dir.join("embeddings").join("item_config.json"),
        }
    }
}

impl RecommenderConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: RecommenderConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml_str = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    /// Apply `BOOKBANDIT_*` environment overrides on top of this config
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(raw) = std::env::var(ENV_ALPHA) {
            self.alpha = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("{} is not a number: {}", ENV_ALPHA, raw))
            })?;
            debug!("alpha overridden from environment: {}", self.alpha);
        }

        if let Ok(raw) = std::env::var(ENV_BATCH_SIZE) {
            self.batch_size = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "{} is not a positive integer: {}",
                    ENV_BATCH_SIZE, raw
                ))
            })?;
            debug!("batch_size overridden from environment: {}", self.batch_size);
        }

        if let Ok(path) = std::env::var(ENV_MODEL_PATH) {
            if !path.is_empty() {
                self.model_path = PathBuf::from(path);
            }
        }

        if let Ok(path) = std::env::var(ENV_ITEM_CONFIG) {
            if !path.is_empty() {
                self.item_config_path = PathBuf::from(path);
            }
        }

        self.validate()?;
        Ok(self)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.alpha.is_finite() || self.alpha < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "alpha must be a finite, non-negative number (got {})",
                self.alpha
            )));
        }

        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::ValidationError(format!(
                "batch_size must be between 1 and {}",
                MAX_BATCH_SIZE
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn clear_env() {
        for key in [ENV_ALPHA, ENV_BATCH_SIZE, ENV_MODEL_PATH, ENV_ITEM_CONFIG] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = RecommenderConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.model_path.ends_with("linucb_model.json"));
    }

    #[test]
    fn test_validate_negative_alpha() {
        let config = RecommenderConfig {
            alpha: -0.1,
            ..Default::default()
        };

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("alpha must be"));
    }

    #[test]
    fn test_validate_batch_size_zero() {
        let config = RecommenderConfig {
            batch_size: 0,
            ..Default::default()
        };

        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("batch_size must be between"));
    }

    #[test]
    fn test_from_toml_partial() {
        let toml_str = r#"
            alpha = 1.0
            batch_size = 32
            model_path = "/tmp/model.json"
        "#;

        let config = RecommenderConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.alpha, 1.0);
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.model_path, PathBuf::from("/tmp/model.json"));
        // Unset fields fall back to defaults
        assert_eq!(
            config.item_config_path,
            RecommenderConfig::default().item_config_path
        );
    }

    #[test]
    fn test_file_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bookbandit.toml");

        let config = RecommenderConfig {
            alpha: 0.25,
            batch_size: 8,
            ..Default::default()
        };
        config.to_file(&path).unwrap();

        let loaded = RecommenderConfig::from_file(&path).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        std::env::set_var(ENV_ALPHA, "2.5");
        std::env::set_var(ENV_BATCH_SIZE, "16");
        std::env::set_var(ENV_MODEL_PATH, "/var/lib/bookbandit/model.json");

        let config = RecommenderConfig::default().with_env_overrides().unwrap();
        assert_eq!(config.alpha, 2.5);
        assert_eq!(config.batch_size, 16);
        assert_eq!(
            config.model_path,
            PathBuf::from("/var/lib/bookbandit/model.json")
        );

        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_override_rejects_garbage() {
        clear_env();
        std::env::set_var(ENV_BATCH_SIZE, "lots");

        let result = RecommenderConfig::default().with_env_overrides();
        assert!(result.is_err());

        clear_env();
    }
}
