use crate::models::IntentId;
use thiserror::Error;

/// Failures of the durable intent log itself (not of the stores it coordinates)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntentLogError {
    #[error("Intent log I/O error on {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Corrupt intent log entry at line {line}: {reason}")]
    Corrupt { line: usize, reason: String },

    #[error("Intent serialization failed: {0}")]
    Serialization(String),

    #[error("Intent {0} not found")]
    NotFound(IntentId),

    #[error("Intent {intent_id} already recorded")]
    Duplicate { intent_id: IntentId },

    #[error("Intent {intent_id} is {status}, expected {expected}")]
    InvalidState {
        intent_id: IntentId,
        status: String,
        expected: String,
    },

    #[error("Intent log database error: {0}")]
    Database(String),
}

impl IntentLogError {
    pub(crate) fn io(path: impl std::fmt::Display, err: std::io::Error) -> Self {
        Self::Io {
            path: path.to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for IntentLogError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for IntentLogError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

pub type IntentLogResult<T> = Result<T, IntentLogError>;
