use super::category::StoreCategory;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("{store} store timed out after {timeout:?}")]
    Timeout {
        store: StoreCategory,
        timeout: Duration,
    },

    #[error("{store} store unavailable: {reason}")]
    Unavailable { store: StoreCategory, reason: String },

    #[error("{store} store does not support filter '{filter}'")]
    UnsupportedFilter {
        store: StoreCategory,
        filter: &'static str,
    },

    #[error("Payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("{store} store backend error: {reason}")]
    Backend { store: StoreCategory, reason: String },
}

impl StoreError {
    pub fn unavailable(store: StoreCategory, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            store,
            reason: reason.into(),
        }
    }

    /// Timeouts and outages are retried; bad filters and oversized payloads are not
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Unavailable { .. } | Self::Backend { .. }
        )
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
