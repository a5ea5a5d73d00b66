//! Fault-injecting store wrapper.
//!
//! Wraps any [`StoreAdapter`] and, depending on its [`FaultMode`], fails,
//! hangs, loses acknowledgements or adds latency. Every put the inner store
//! actually applied is recorded so tests can assert ordering and the absence
//! of duplicate effects.

use crate::models::{Attributes, EntityId, IntentStamp, StoreRecord, StoreWrite};
use crate::stores::{PutOutcome, StoreAdapter, StoreCategory, StoreError, StoreFilter, StoreResult};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultMode {
    Healthy,
    /// Every call fails immediately
    Failing,
    /// Every call blocks until the caller's timeout fires
    Hanging,
    /// Writes are applied but reported as failed
    AckLost,
    /// Writes fail without being applied; reads succeed
    RejectWrites,
}

#[derive(Debug)]
pub struct FlakyStore {
    inner: Arc<dyn StoreAdapter>,
    name: String,
    mode: RwLock<FaultMode>,
    latency: RwLock<Duration>,
    put_calls: AtomicUsize,
    applied: Mutex<Vec<(EntityId, Attributes)>>,
}

impl FlakyStore {
    pub fn new(inner: Arc<dyn StoreAdapter>) -> Self {
        Self {
            name: format!("flaky-{}", inner.name()),
            inner,
            mode: RwLock::new(FaultMode::Healthy),
            latency: RwLock::new(Duration::ZERO),
            put_calls: AtomicUsize::new(0),
            applied: Mutex::new(Vec::new()),
        }
    }

    pub fn set_mode(&self, mode: FaultMode) {
        *self.mode.write() = mode;
    }

    pub fn mode(&self) -> FaultMode {
        *self.mode.read()
    }

    pub fn heal(&self) {
        self.set_mode(FaultMode::Healthy);
    }

    /// Delay added before every call
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.write() = latency;
    }

    /// Put calls received, applied or not
    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    /// Puts the inner store actually applied, in order
    pub fn applied_puts(&self) -> Vec<(EntityId, Attributes)> {
        self.applied.lock().clone()
    }

    pub fn applied_puts_for(&self, entity_id: EntityId) -> Vec<Attributes> {
        self.applied
            .lock()
            .iter()
            .filter(|(id, _)| *id == entity_id)
            .map(|(_, attributes)| attributes.clone())
            .collect()
    }

    fn injected(&self, reason: &str) -> StoreError {
        StoreError::unavailable(self.inner.category(), format!("injected: {reason}"))
    }

    /// Latency plus the read-side faults. Returns the mode for write-side handling.
    async fn before_call(&self) -> StoreResult<FaultMode> {
        let latency = *self.latency.read();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        let mode = self.mode();
        match mode {
            FaultMode::Failing => Err(self.injected("store failure")),
            FaultMode::Hanging => {
                tokio::time::sleep(Duration::from_secs(3_600)).await;
                Err(self.injected("store hung"))
            }
            FaultMode::Healthy | FaultMode::AckLost | FaultMode::RejectWrites => Ok(mode),
        }
    }
}

#[async_trait]
impl StoreAdapter for FlakyStore {
    fn category(&self) -> StoreCategory {
        self.inner.category()
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn put(&self, id: EntityId, data: StoreWrite) -> StoreResult<PutOutcome> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        let mode = self.before_call().await?;
        if mode == FaultMode::RejectWrites {
            return Err(self.injected("write rejected"));
        }

        let attributes = data.attributes.clone();
        let outcome = self.inner.put(id, data).await?;
        if outcome == PutOutcome::Applied {
            self.applied.lock().push((id, attributes));
        }

        match mode {
            FaultMode::AckLost => Err(self.injected("acknowledgement lost")),
            _ => Ok(outcome),
        }
    }

    async fn get(&self, id: EntityId) -> StoreResult<Option<StoreRecord>> {
        self.before_call().await?;
        self.inner.get(id).await
    }

    async fn delete(&self, id: EntityId, stamp: IntentStamp) -> StoreResult<bool> {
        let mode = self.before_call().await?;
        if mode == FaultMode::RejectWrites {
            return Err(self.injected("write rejected"));
        }
        let existed = self.inner.delete(id, stamp).await?;
        match mode {
            FaultMode::AckLost => Err(self.injected("acknowledgement lost")),
            _ => Ok(existed),
        }
    }

    async fn query(&self, filter: &StoreFilter) -> StoreResult<Vec<StoreRecord>> {
        self.before_call().await?;
        self.inner.query(filter).await
    }
}
