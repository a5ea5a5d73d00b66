//! # Structured Logging Module
//!
//! Console or JSON structured logging for the data-access layer, plus helpers
//! that emit consistently shaped events for intent and store operations.

use crate::config::LoggingConfig;
use crate::models::{EntityId, IntentId};
use crate::stores::StoreCategory;
use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging. `RUST_LOG` wins over `config.level`.
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_structured_logging(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(resolve_log_level(&config.level)));

        let layer = if config.json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // A host application may already own the global subscriber
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            level = %config.level,
            json = config.json,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

fn resolve_log_level(level: &str) -> String {
    match level.trim() {
        "" => "info".to_string(),
        other => other.to_string(),
    }
}

/// Log a transition in an intent's lifecycle
pub fn log_intent_operation(
    operation: &str,
    intent_id: IntentId,
    entity_id: EntityId,
    status: &str,
    attempts: u32,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        intent_id = %intent_id,
        entity_id = %entity_id,
        status = %status,
        attempts = attempts,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📝 INTENT_OPERATION"
    );
}

/// Log the outcome of one call against one store
pub fn log_store_operation(
    operation: &str,
    store: StoreCategory,
    entity_id: Option<EntityId>,
    status: &str,
    duration_ms: Option<u64>,
    details: Option<&str>,
) {
    let entity_id = entity_id.map(|id| id.to_string());
    tracing::debug!(
        operation = %operation,
        store = %store,
        entity_id = entity_id.as_deref(),
        status = %status,
        duration_ms = duration_ms,
        details = details,
        "💾 STORE_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}
