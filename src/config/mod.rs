//! # Fieldkit Configuration
//!
//! Typed configuration for the data-access layer. Values are layered by
//! [`ConfigManager`]: built-in defaults, then `config/fieldkit.*`, then
//! `config/fieldkit.<environment>.*`, then `FIELDKIT__SECTION__KEY` environment
//! variables.
//!
//! ```yaml
//! # config/fieldkit.yaml
//! stores:
//!   default_timeout_ms: 2000
//!   timeouts_ms:
//!     blob: 10000
//! consistency:
//!   max_attempts: 6
//!   reconciler_poll_interval_ms: 1000
//!   completed_retention_ms: 300000
//!   intent_log:
//!     backend: file
//!     path: var/intents.jsonl
//! backoff:
//!   base_delay_ms: 500
//!   multiplier: 2.0
//!   max_delay_ms: 60000
//! rotation:
//!   restriction_window_days: 365
//! ```

pub mod error;
pub mod loader;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

use crate::constants::system;
use crate::stores::StoreCategory;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldkitConfig {
    pub stores: StoreConfig,
    pub consistency: ConsistencyConfig,
    pub backoff: BackoffConfig,
    pub rotation: RotationConfig,
    pub query: QueryConfig,
    pub logging: LoggingConfig,
}

impl FieldkitConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.stores.default_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "stores.default_timeout_ms",
                0,
                "store calls must carry a non-zero timeout",
            ));
        }
        if let Some((category, _)) = self.stores.timeouts_ms.iter().find(|(_, ms)| **ms == 0) {
            return Err(ConfigurationError::invalid_value(
                format!("stores.timeouts_ms.{category}"),
                0,
                "store calls must carry a non-zero timeout",
            ));
        }
        if self.consistency.max_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "consistency.max_attempts",
                0,
                "at least one attempt is required",
            ));
        }
        if self.consistency.reconciler_poll_interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "consistency.reconciler_poll_interval_ms",
                0,
                "poll interval must be positive",
            ));
        }
        match self.consistency.intent_log.backend {
            IntentLogBackend::File if self.consistency.intent_log.path.is_none() => {
                return Err(ConfigurationError::missing_required_field(
                    "path",
                    "consistency.intent_log (backend = file)",
                ));
            }
            IntentLogBackend::Postgres if self.consistency.intent_log.database_url.is_none() => {
                return Err(ConfigurationError::missing_required_field(
                    "database_url",
                    "consistency.intent_log (backend = postgres)",
                ));
            }
            _ => {}
        }
        if self.backoff.multiplier < 1.0 {
            return Err(ConfigurationError::invalid_value(
                "backoff.multiplier",
                self.backoff.multiplier,
                "multiplier below 1.0 would shrink delays",
            ));
        }
        if self.backoff.max_delay_ms < self.backoff.base_delay_ms {
            return Err(ConfigurationError::invalid_value(
                "backoff.max_delay_ms",
                self.backoff.max_delay_ms,
                "must be at least backoff.base_delay_ms",
            ));
        }
        if self.rotation.restriction_window_days < 0 {
            return Err(ConfigurationError::invalid_value(
                "rotation.restriction_window_days",
                self.rotation.restriction_window_days,
                "window cannot be negative",
            ));
        }
        if self.query.page_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "query.page_size",
                0,
                "page size must be positive",
            ));
        }
        Ok(())
    }
}

/// Store adapter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Timeout applied to every store call without a per-category override
    pub default_timeout_ms: u64,
    /// Per-category overrides
    pub timeouts_ms: BTreeMap<StoreCategory, u64>,
    pub max_blob_bytes: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: system::DEFAULT_STORE_TIMEOUT_MS,
            timeouts_ms: BTreeMap::new(),
            max_blob_bytes: system::DEFAULT_MAX_BLOB_BYTES,
        }
    }
}

impl StoreConfig {
    pub fn timeout_for(&self, category: StoreCategory) -> Duration {
        Duration::from_millis(
            self.timeouts_ms
                .get(&category)
                .copied()
                .unwrap_or(self.default_timeout_ms),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentLogBackend {
    #[default]
    Memory,
    File,
    Postgres,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentLogConfig {
    pub backend: IntentLogBackend,
    /// JSON-lines file for the `file` backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Connection string for the `postgres` backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    /// fsync after every append (`file` backend)
    pub sync_writes: bool,
}

impl Default for IntentLogConfig {
    fn default() -> Self {
        Self {
            backend: IntentLogBackend::Memory,
            path: None,
            database_url: None,
            sync_writes: true,
        }
    }
}

/// Intent protocol and reconciler settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsistencyConfig {
    /// Attempts per intent before it is marked FAILED
    pub max_attempts: u32,
    pub reconciler_enabled: bool,
    pub reconciler_poll_interval_ms: u64,
    /// How long COMPLETE intents stay in the log before the reconciler prunes them
    pub completed_retention_ms: u64,
    pub intent_log: IntentLogConfig,
}

impl Default for ConsistencyConfig {
    fn default() -> Self {
        Self {
            max_attempts: system::DEFAULT_MAX_ATTEMPTS,
            reconciler_enabled: true,
            reconciler_poll_interval_ms: system::DEFAULT_RECONCILER_POLL_INTERVAL_MS,
            completed_retention_ms: system::DEFAULT_COMPLETED_RETENTION_MS,
            intent_log: IntentLogConfig::default(),
        }
    }
}

impl ConsistencyConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.reconciler_poll_interval_ms)
    }

    pub fn completed_retention(&self) -> Duration {
        Duration::from_millis(self.completed_retention_ms)
    }
}

/// Exponential backoff between reconciliation attempts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: system::DEFAULT_BACKOFF_BASE_MS,
            multiplier: system::DEFAULT_BACKOFF_MULTIPLIER,
            max_delay_ms: system::DEFAULT_BACKOFF_MAX_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Minimum gap in days between plantings of one family on one field
    pub restriction_window_days: i64,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            restriction_window_days: system::DEFAULT_ROTATION_WINDOW_DAYS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub page_size: usize,
    pub search_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            page_size: system::DEFAULT_PAGE_SIZE,
            search_limit: system::DEFAULT_SEARCH_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration_is_valid() {
        let config = FieldkitConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.query.page_size, 5);
        assert_eq!(config.consistency.intent_log.backend, IntentLogBackend::Memory);
    }

    #[test]
    fn test_file_backend_requires_path() {
        let mut config = FieldkitConfig::default();
        config.consistency.intent_log.backend = IntentLogBackend::File;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::MissingRequiredField { .. })
        ));
    }

    #[test]
    fn test_per_category_timeout_override() {
        let mut stores = StoreConfig::default();
        stores.timeouts_ms.insert(StoreCategory::Blob, 10_000);
        assert_eq!(stores.timeout_for(StoreCategory::Blob), Duration::from_secs(10));
        assert_eq!(stores.timeout_for(StoreCategory::Search), Duration::from_secs(2));
    }
}
