use crate::models::{EntityId, IntentStamp, StoreRecord, StoreWrite};
use crate::stores::{PutOutcome, StoreAdapter, StoreCategory, StoreError, StoreFilter, StoreResult};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Routed adapter plus the timeout every call through it carries
#[derive(Debug, Clone)]
pub struct StoreHandle {
    category: StoreCategory,
    adapter: Arc<dyn StoreAdapter>,
    timeout: Duration,
}

impl StoreHandle {
    pub(crate) fn new(adapter: Arc<dyn StoreAdapter>, timeout: Duration) -> Self {
        Self {
            category: adapter.category(),
            adapter,
            timeout,
        }
    }

    pub fn category(&self) -> StoreCategory {
        self.category
    }

    pub fn adapter_name(&self) -> &str {
        self.adapter.name()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn adapter(&self) -> &Arc<dyn StoreAdapter> {
        &self.adapter
    }

    async fn bounded<T>(&self, call: impl Future<Output = StoreResult<T>>) -> StoreResult<T> {
        match timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout {
                store: self.category,
                timeout: self.timeout,
            }),
        }
    }

    pub async fn put(&self, id: EntityId, data: StoreWrite) -> StoreResult<PutOutcome> {
        self.bounded(self.adapter.put(id, data)).await
    }

    pub async fn get(&self, id: EntityId) -> StoreResult<Option<StoreRecord>> {
        self.bounded(self.adapter.get(id)).await
    }

    pub async fn delete(&self, id: EntityId, stamp: IntentStamp) -> StoreResult<bool> {
        self.bounded(self.adapter.delete(id, stamp)).await
    }

    pub async fn query(&self, filter: &StoreFilter) -> StoreResult<Vec<StoreRecord>> {
        self.bounded(self.adapter.query(filter)).await
    }
}
