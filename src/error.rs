//! Error types for the Fieldkit data-access layer.
//!
//! Each subsystem owns a focused error enum; [`FieldkitError`] folds them together
//! so facade callers only match on one type.

use crate::config::ConfigurationError;
use crate::consistency::IntentLogError;
use crate::guards::GuardError;
use crate::models::{EntityId, IntentId};
use crate::registry::SchemaError;
use crate::routing::RoutingError;
use crate::stores::{StoreCategory, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FieldkitError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Intent log error: {0}")]
    IntentLog(#[from] IntentLogError),

    #[error("Write rejected: {0}")]
    Guard(#[from] GuardError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Some stores applied the write, the rest are queued on a PENDING intent.
    #[error(
        "Partial write for entity {entity_id} (intent {intent_id}): pending on {pending_stores:?}"
    )]
    PartialWriteFailure {
        intent_id: IntentId,
        entity_id: EntityId,
        pending_stores: Vec<StoreCategory>,
    },

    /// Bounded retries ran out; the intent is FAILED and needs an operator.
    #[error("Reconciliation exhausted for intent {intent_id} after {attempts} attempts: {last_error}")]
    ReconciliationExhausted {
        intent_id: IntentId,
        entity_id: EntityId,
        attempts: u32,
        last_error: String,
    },

    #[error("Entity {entity_id} is incomplete: stores unavailable {unavailable:?}")]
    IncompleteRead {
        entity_id: EntityId,
        unavailable: Vec<StoreCategory>,
    },

    #[error("Entity not found: {0}")]
    NotFound(EntityId),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Shutdown error: {0}")]
    Shutdown(String),
}

impl From<serde_json::Error> for FieldkitError {
    fn from(error: serde_json::Error) -> Self {
        FieldkitError::Serialization(error.to_string())
    }
}

impl FieldkitError {
    /// Stable machine-readable kind, used by the request/response API.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldkitError::Schema(_) => "schema_error",
            FieldkitError::Routing(_) => "routing_error",
            FieldkitError::Store(_) => "store_error",
            FieldkitError::IntentLog(_) => "intent_log_error",
            FieldkitError::Guard(_) => "write_rejected",
            FieldkitError::Configuration(_) => "configuration_error",
            FieldkitError::PartialWriteFailure { .. } => "partial_write_failure",
            FieldkitError::ReconciliationExhausted { .. } => "reconciliation_exhausted",
            FieldkitError::IncompleteRead { .. } => "incomplete_read",
            FieldkitError::NotFound(_) => "not_found",
            FieldkitError::Validation(_) => "validation_error",
            FieldkitError::Serialization(_) => "serialization_error",
            FieldkitError::Shutdown(_) => "shutdown_error",
        }
    }
}

pub type FieldkitResult<T> = std::result::Result<T, FieldkitError>;
pub type Result<T> = FieldkitResult<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_stable() {
        let err = FieldkitError::Validation("bad".to_string());
        assert_eq!(err.kind(), "validation_error");
        assert_eq!(err.to_string(), "Validation error: bad");

        let err = FieldkitError::from(RoutingError::UnknownEntityType("silo".to_string()));
        assert_eq!(err.kind(), "routing_error");
        assert!(err.to_string().contains("silo"));
    }

    #[test]
    fn test_partial_write_message_lists_pending_stores() {
        let err = FieldkitError::PartialWriteFailure {
            intent_id: IntentId::new(),
            entity_id: EntityId::new(),
            pending_stores: vec![StoreCategory::Search],
        };
        assert!(err.to_string().contains("Search"));
    }
}
