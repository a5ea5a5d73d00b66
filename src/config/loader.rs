//! Configuration Loader
//!
//! Environment-aware layered loading on top of the `config` crate. Later layers
//! override earlier ones:
//!
//! 1. [`FieldkitConfig::default`]
//! 2. `<dir>/fieldkit.{yaml,toml,json}` (optional)
//! 3. `<dir>/fieldkit.<environment>.{yaml,toml,json}` (optional)
//! 4. `FIELDKIT__<SECTION>__<KEY>` environment variables

use super::error::{ConfigResult, ConfigurationError};
use super::FieldkitConfig;
use crate::constants::system::ENV_PREFIX;
use config::{Config, Environment, File};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub struct ConfigManager {
    config: FieldkitConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with an explicit environment.
    /// Useful in tests that should not touch process-wide environment variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let config = Self::load_and_merge_config(&config_directory, environment)?;
        config.validate()?;

        info!(
            environment = environment,
            intent_log = ?config.consistency.intent_log.backend,
            max_attempts = config.consistency.max_attempts,
            "Configuration loaded successfully"
        );
        debug!(
            "Effective configuration: {}",
            serde_json::to_string(&Self::sanitize_config_for_logging(&config))
                .unwrap_or_else(|_| "[serialization error]".to_string())
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration (tests, embedding applications)
    pub fn from_config(config: FieldkitConfig, environment: &str) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: PathBuf::from("config"),
        }))
    }

    pub fn config(&self) -> &FieldkitConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Configuration as JSON with connection strings masked
    pub fn debug_config(&self) -> serde_json::Value {
        Self::sanitize_config_for_logging(&self.config)
    }

    /// `FIELDKIT_ENV`, then `APP_ENV`, defaulting to `development`
    pub fn detect_environment() -> String {
        env::var("FIELDKIT_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    fn load_and_merge_config(directory: &Path, environment: &str) -> ConfigResult<FieldkitConfig> {
        let load_error = |e: config::ConfigError| ConfigurationError::LoadError {
            environment: environment.to_string(),
            error: e.to_string(),
        };

        let defaults = Config::try_from(&FieldkitConfig::default()).map_err(load_error)?;
        let merged = Config::builder()
            .add_source(defaults)
            .add_source(File::from(directory.join("fieldkit")).required(false))
            .add_source(File::from(directory.join(format!("fieldkit.{environment}"))).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(load_error)?;

        merged
            .try_deserialize::<FieldkitConfig>()
            .map_err(|e| ConfigurationError::DeserializeError(e.to_string()))
    }

    fn sanitize_config_for_logging(config: &FieldkitConfig) -> serde_json::Value {
        let mut value = serde_json::to_value(config).unwrap_or(serde_json::Value::Null);
        if let Some(url) = value
            .pointer_mut("/consistency/intent_log/database_url")
            .filter(|v| v.is_string())
        {
            *url = serde_json::Value::String("[MASKED]".to_string());
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IntentLogBackend;
    use crate::stores::StoreCategory;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_missing_directory_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let manager =
            ConfigManager::load_from_directory_with_env(Some(dir.path().join("nope")), "test").unwrap();
        assert_eq!(manager.config(), &FieldkitConfig::default());
        assert_eq!(manager.environment(), "test");
    }

    #[test]
    fn test_environment_file_overrides_base_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("fieldkit.yaml"),
            "consistency:\n  max_attempts: 3\nrotation:\n  restriction_window_days: 365\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("fieldkit.test.yaml"),
            "consistency:\n  max_attempts: 9\nstores:\n  timeouts_ms:\n    blob: 5000\n",
        )
        .unwrap();

        let manager =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test").unwrap();
        let config = manager.config();
        assert_eq!(config.consistency.max_attempts, 9);
        assert_eq!(config.rotation.restriction_window_days, 365);
        assert_eq!(config.stores.timeout_for(StoreCategory::Blob), Duration::from_secs(5));
        assert_eq!(config.consistency.intent_log.backend, IntentLogBackend::Memory);
    }

    #[test]
    fn test_invalid_file_values_are_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("fieldkit.yaml"), "query:\n  page_size: 0\n").unwrap();

        let result = ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test");
        assert!(matches!(result, Err(ConfigurationError::InvalidValue { .. })));
    }

    #[test]
    fn test_database_url_is_masked() {
        let mut config = FieldkitConfig::default();
        config.consistency.intent_log.backend = IntentLogBackend::Postgres;
        config.consistency.intent_log.database_url = Some("postgres://u:secret@db/fk".into());
        let manager = ConfigManager::from_config(config, "test").unwrap();

        let rendered = manager.debug_config().to_string();
        assert!(!rendered.contains("secret"));
    }
}
