//! # Consistency Coordinator
//!
//! Runs the intent protocol for every write:
//!
//! 1. persist a PENDING intent in the [`IntentLog`]
//! 2. apply each target store in fixed store order, with the intent stamp
//! 3. mark the intent COMPLETE once every target acknowledged
//!
//! Targets that fail or time out leave the intent PENDING with a backoff
//! schedule; after `max_attempts` it is marked FAILED and broadcast to
//! subscribers. Intents are serialized per entity: a new intent waits behind
//! every earlier PENDING intent of the same entity, while distinct entities
//! proceed in parallel.
//!
//! Puts are admitted under the same per-entity lock. A put may not change the
//! type of an existing entity, and an immutable entity accepts exactly one put.

use super::backoff::BackoffPolicy;
use super::errors::IntentLogError;
use super::intent::{IntentOperation, IntentRecord, IntentStatus};
use super::intent_log::IntentLog;
use crate::config::{BackoffConfig, ConsistencyConfig};
use crate::constants::events;
use crate::error::{FieldkitError, FieldkitResult};
use crate::logging::{log_intent_operation, log_store_operation};
use crate::models::{Attributes, EntityId, EntityType, IntentId, StoreWrite};
use crate::routing::StoreRouter;
use crate::stores::{PutOutcome, StoreCategory};
use chrono::Utc;
use dashmap::DashMap;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, instrument, warn};

const EXHAUSTED_CHANNEL_CAPACITY: usize = 256;

/// What the caller learns about a submitted write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteReceipt {
    pub intent_id: IntentId,
    pub entity_id: EntityId,
    pub sequence: u64,
    pub operation: IntentOperation,
    pub status: IntentStatus,
    pub attempts: u32,
    /// Stores that hold this write
    pub acknowledged: Vec<StoreCategory>,
    /// Stores the reconciler still has to apply it to
    pub pending: Vec<StoreCategory>,
    pub last_error: Option<String>,
}

impl WriteReceipt {
    pub fn is_complete(&self) -> bool {
        self.status == IntentStatus::Complete
    }

    /// Treat anything short of COMPLETE as an error
    pub fn into_result(self) -> FieldkitResult<Self> {
        match self.status {
            IntentStatus::Complete => Ok(self),
            IntentStatus::Pending => Err(FieldkitError::PartialWriteFailure {
                intent_id: self.intent_id,
                entity_id: self.entity_id,
                pending_stores: self.pending,
            }),
            IntentStatus::Failed => Err(FieldkitError::ReconciliationExhausted {
                intent_id: self.intent_id,
                entity_id: self.entity_id,
                attempts: self.attempts,
                last_error: self.last_error.unwrap_or_default(),
            }),
        }
    }
}

impl From<&IntentRecord> for WriteReceipt {
    fn from(record: &IntentRecord) -> Self {
        Self {
            intent_id: record.intent_id,
            entity_id: record.entity_id,
            sequence: record.sequence,
            operation: record.operation,
            status: record.status,
            attempts: record.attempts,
            acknowledged: record.acknowledged_stores(),
            pending: record.pending_stores(),
            last_error: record.last_error.clone(),
        }
    }
}

/// Broadcast when an intent runs out of attempts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExhaustedIntent {
    pub intent_id: IntentId,
    pub entity_id: EntityId,
    pub entity_type: EntityType,
    pub attempts: u32,
    pub pending_stores: Vec<StoreCategory>,
    pub last_error: String,
}

impl ExhaustedIntent {
    pub fn to_error(&self) -> FieldkitError {
        FieldkitError::ReconciliationExhausted {
            intent_id: self.intent_id,
            entity_id: self.entity_id,
            attempts: self.attempts,
            last_error: self.last_error.clone(),
        }
    }
}

pub struct ConsistencyCoordinator {
    router: Arc<StoreRouter>,
    log: Arc<dyn IntentLog>,
    backoff: BackoffPolicy,
    max_attempts: u32,
    entity_locks: DashMap<EntityId, Arc<Mutex<()>>>,
    exhausted_tx: broadcast::Sender<ExhaustedIntent>,
}

impl std::fmt::Debug for ConsistencyCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsistencyCoordinator")
            .field("log", &self.log.backend())
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("locked_entities", &self.entity_locks.len())
            .finish()
    }
}

impl ConsistencyCoordinator {
    pub fn new(
        router: Arc<StoreRouter>,
        log: Arc<dyn IntentLog>,
        max_attempts: u32,
        backoff: BackoffPolicy,
    ) -> Self {
        let (exhausted_tx, _) = broadcast::channel(EXHAUSTED_CHANNEL_CAPACITY);
        Self {
            router,
            log,
            backoff,
            max_attempts: max_attempts.max(1),
            entity_locks: DashMap::new(),
            exhausted_tx,
        }
    }

    pub fn from_config(
        router: Arc<StoreRouter>,
        log: Arc<dyn IntentLog>,
        consistency: &ConsistencyConfig,
        backoff: &BackoffConfig,
    ) -> Self {
        Self::new(
            router,
            log,
            consistency.max_attempts,
            BackoffPolicy::from(backoff),
        )
    }

    pub fn router(&self) -> &Arc<StoreRouter> {
        &self.router
    }

    pub fn intent_log(&self) -> &Arc<dyn IntentLog> {
        &self.log
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Receive every intent that is marked FAILED from now on
    pub fn subscribe_exhausted(&self) -> broadcast::Receiver<ExhaustedIntent> {
        self.exhausted_tx.subscribe()
    }

    /// Record and apply a (partial) put of `attributes` to `entity_id`
    #[instrument(skip_all, fields(entity_type = %entity_type, entity_id = %entity_id))]
    pub async fn submit_put(
        &self,
        entity_type: &EntityType,
        entity_id: EntityId,
        attributes: &Attributes,
    ) -> FieldkitResult<WriteReceipt> {
        let immutable = self.router.plan(entity_type)?.immutable;
        let writes = self.router.route_write(entity_type, attributes)?;
        if writes.is_empty() {
            return Err(FieldkitError::Validation(format!(
                "Write to {entity_type} {entity_id} carries no attributes"
            )));
        }

        let lock = self.entity_lock(entity_id);
        let _guard = lock.lock().await;
        self.admit_put(entity_type, entity_id, immutable).await?;
        self.record_and_apply(entity_id, |sequence| {
            IntentRecord::put(sequence, entity_id, entity_type.clone(), writes)
        })
        .await
    }

    /// Record and apply removal of `entity_id` from every store
    #[instrument(skip_all, fields(entity_type = %entity_type, entity_id = %entity_id))]
    pub async fn submit_delete(
        &self,
        entity_type: &EntityType,
        entity_id: EntityId,
    ) -> FieldkitResult<WriteReceipt> {
        self.router.plan(entity_type)?;
        let stores: Vec<StoreCategory> = self.router.handles().iter().map(|h| h.category()).collect();

        let lock = self.entity_lock(entity_id);
        let _guard = lock.lock().await;
        self.record_and_apply(entity_id, |sequence| {
            IntentRecord::delete(sequence, entity_id, entity_type.clone(), stores)
        })
        .await
    }

    /// Reject a put that would retype an existing entity or rewrite an
    /// immutable one. Caller holds the entity lock.
    async fn admit_put(
        &self,
        entity_type: &EntityType,
        entity_id: EntityId,
        immutable: bool,
    ) -> FieldkitResult<()> {
        // Open intents describe where the entity is heading; stores may lag behind
        let mut heading: Option<Option<EntityType>> = None;
        for intent in self.log.open_for_entity(entity_id).await? {
            heading = Some(match intent.operation {
                IntentOperation::Put => Some(intent.entity_type),
                IntentOperation::Delete => None,
            });
        }
        let existing = match heading {
            Some(existing) => existing,
            None => self.stored_type(entity_id, immutable).await?,
        };

        match existing {
            Some(found) if found != *entity_type => Err(FieldkitError::Validation(format!(
                "Entity {entity_id} already exists as {found}"
            ))),
            Some(_) if immutable => Err(FieldkitError::Validation(format!(
                "{entity_type} {entity_id} is immutable once recorded"
            ))),
            _ => Ok(()),
        }
    }

    /// Type of the entity as any store holds it. With `strict`, an unreachable
    /// store makes absence unprovable and the read fails.
    async fn stored_type(&self, entity_id: EntityId, strict: bool) -> FieldkitResult<Option<EntityType>> {
        let handles = self.router.handles();
        let results = join_all(handles.iter().map(|handle| handle.get(entity_id))).await;

        let mut unavailable = Vec::new();
        for (handle, result) in handles.iter().zip(results) {
            match result {
                Ok(Some(record)) => return Ok(Some(record.entity_type)),
                Ok(None) => {}
                Err(e) => {
                    debug!(entity_id = %entity_id, store = %handle.category(), error = %e, "Store unavailable while admitting put");
                    unavailable.push(handle.category());
                }
            }
        }
        if strict && !unavailable.is_empty() {
            return Err(FieldkitError::IncompleteRead {
                entity_id,
                unavailable,
            });
        }
        Ok(None)
    }

    /// Append the intent, drain earlier intents of the entity, then apply.
    /// Caller holds the entity lock.
    async fn record_and_apply(
        &self,
        entity_id: EntityId,
        build: impl FnOnce(u64) -> IntentRecord,
    ) -> FieldkitResult<WriteReceipt> {
        let mut record = build(self.log.next_sequence().await?);
        self.log.append(&record).await?;
        log_intent_operation(
            events::INTENT_RECORDED,
            record.intent_id,
            entity_id,
            &record.status.to_string(),
            record.attempts,
            Some(&record.operation.to_string()),
        );

        if let Some(blocker) = self.drain_predecessors(entity_id, record.sequence).await? {
            log_intent_operation(
                events::INTENT_QUEUED,
                record.intent_id,
                entity_id,
                &record.status.to_string(),
                record.attempts,
                Some(&format!("waiting behind intent {blocker}")),
            );
            return Ok(WriteReceipt::from(&record));
        }

        self.apply(&mut record).await?;
        Ok(WriteReceipt::from(&record))
    }

    /// Retry earlier PENDING intents of the entity. Returns the first one that is
    /// still pending afterwards, which blocks everything queued behind it.
    async fn drain_predecessors(
        &self,
        entity_id: EntityId,
        before: u64,
    ) -> FieldkitResult<Option<IntentId>> {
        for mut earlier in self.log.pending_for_entity(entity_id).await? {
            if earlier.sequence >= before {
                break;
            }
            self.apply(&mut earlier).await?;
            if earlier.status == IntentStatus::Pending {
                return Ok(Some(earlier.intent_id));
            }
        }
        Ok(None)
    }

    /// Retry the PENDING intents of one entity in sequence order, stopping at the
    /// first one that stays pending. Without `force` only due intents are tried.
    #[instrument(skip_all, fields(entity_id = %entity_id))]
    pub async fn reconcile_entity(
        &self,
        entity_id: EntityId,
        force: bool,
    ) -> FieldkitResult<Vec<IntentRecord>> {
        let lock = self.entity_lock(entity_id);
        let _guard = lock.lock().await;

        let now = Utc::now();
        let mut attempted = Vec::new();
        for mut record in self.log.pending_for_entity(entity_id).await? {
            if !force && !record.is_due(now) {
                break;
            }
            self.apply(&mut record).await?;
            let blocked = record.status == IntentStatus::Pending;
            attempted.push(record);
            if blocked {
                break;
            }
        }
        Ok(attempted)
    }

    /// One apply attempt over the unacknowledged targets, then persist the outcome
    async fn apply(&self, record: &mut IntentRecord) -> FieldkitResult<()> {
        let stamp = record.stamp();
        let entity_id = record.entity_id;
        let entity_type = record.entity_type.clone();
        let operation = record.operation;

        for target in record.targets.iter_mut().filter(|t| !t.acknowledged) {
            let started = Instant::now();
            let result = match self.router.handle(target.store) {
                Ok(handle) => match operation {
                    IntentOperation::Put => handle
                        .put(
                            entity_id,
                            StoreWrite {
                                entity_type: entity_type.clone(),
                                attributes: target.attributes.clone(),
                                stamp,
                            },
                        )
                        .await
                        .map(|outcome| match outcome {
                            PutOutcome::Applied => "applied",
                            PutOutcome::AlreadyApplied => "already_applied",
                        })
                        .map_err(|e| e.to_string()),
                    IntentOperation::Delete => handle
                        .delete(entity_id, stamp)
                        .await
                        .map(|existed| if existed { "deleted" } else { "absent" })
                        .map_err(|e| e.to_string()),
                },
                Err(e) => Err(e.to_string()),
            };
            let elapsed = Some(started.elapsed().as_millis() as u64);

            match result {
                Ok(status) => {
                    target.acknowledged = true;
                    target.last_error = None;
                    log_store_operation(
                        &operation.to_string(),
                        target.store,
                        Some(entity_id),
                        status,
                        elapsed,
                        None,
                    );
                }
                Err(reason) => {
                    warn!(
                        intent_id = %record.intent_id,
                        entity_id = %entity_id,
                        store = %target.store,
                        error = %reason,
                        "Store did not acknowledge intent"
                    );
                    log_store_operation(
                        &operation.to_string(),
                        target.store,
                        Some(entity_id),
                        "failed",
                        elapsed,
                        Some(&reason),
                    );
                    target.last_error = Some(reason);
                }
            }
        }

        let now = Utc::now();
        record.attempts += 1;
        record.updated_at = now;
        record.last_error = record
            .targets
            .iter()
            .find_map(|t| t.last_error.as_ref().map(|e| format!("{}: {e}", t.store)));

        let event = if record.all_acknowledged() {
            record.status = IntentStatus::Complete;
            events::INTENT_COMPLETED
        } else if record.attempts >= self.max_attempts {
            record.status = IntentStatus::Failed;
            events::INTENT_FAILED
        } else {
            let delay = self.backoff.delay_for(record.attempts);
            record.next_attempt_at =
                now + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
            events::INTENT_PENDING
        };

        self.log.update(record).await?;
        log_intent_operation(
            event,
            record.intent_id,
            entity_id,
            &record.status.to_string(),
            record.attempts,
            record.last_error.as_deref(),
        );

        if record.status == IntentStatus::Failed {
            self.publish_exhausted(record);
        }
        Ok(())
    }

    fn publish_exhausted(&self, record: &IntentRecord) {
        let exhausted = ExhaustedIntent {
            intent_id: record.intent_id,
            entity_id: record.entity_id,
            entity_type: record.entity_type.clone(),
            attempts: record.attempts,
            pending_stores: record.pending_stores(),
            last_error: record.last_error.clone().unwrap_or_default(),
        };
        error!(
            intent_id = %exhausted.intent_id,
            entity_id = %exhausted.entity_id,
            attempts = exhausted.attempts,
            pending_stores = ?exhausted.pending_stores,
            last_error = %exhausted.last_error,
            "🚨 Reconciliation exhausted; intent requires operator action"
        );
        if self.exhausted_tx.send(exhausted).is_err() {
            debug!("No subscribers for exhausted intents");
        }
    }

    pub async fn intent(&self, intent_id: IntentId) -> FieldkitResult<Option<IntentRecord>> {
        Ok(self.log.get(intent_id).await?)
    }

    pub async fn pending_intents(&self) -> FieldkitResult<Vec<IntentRecord>> {
        Ok(self.log.pending().await?)
    }

    pub async fn failed_intents(&self) -> FieldkitResult<Vec<IntentRecord>> {
        Ok(self.log.by_status(IntentStatus::Failed).await?)
    }

    /// Operator action: put a FAILED intent back in the retry queue with a
    /// fresh attempt budget
    #[instrument(skip_all, fields(intent_id = %intent_id))]
    pub async fn requeue(&self, intent_id: IntentId) -> FieldkitResult<IntentRecord> {
        let record = self
            .log
            .get(intent_id)
            .await?
            .ok_or(IntentLogError::NotFound(intent_id))?;

        let lock = self.entity_lock(record.entity_id);
        let _guard = lock.lock().await;

        let mut record = self
            .log
            .get(intent_id)
            .await?
            .ok_or(IntentLogError::NotFound(intent_id))?;
        if record.status != IntentStatus::Failed {
            return Err(IntentLogError::InvalidState {
                intent_id,
                status: record.status.to_string(),
                expected: IntentStatus::Failed.to_string(),
            }
            .into());
        }

        let now = Utc::now();
        record.status = IntentStatus::Pending;
        record.attempts = 0;
        record.next_attempt_at = now;
        record.updated_at = now;
        self.log.update(&record).await?;
        log_intent_operation(
            events::INTENT_REQUEUED,
            record.intent_id,
            record.entity_id,
            &record.status.to_string(),
            record.attempts,
            record.last_error.as_deref(),
        );
        Ok(record)
    }

    fn entity_lock(&self, entity_id: EntityId) -> Arc<Mutex<()>> {
        self.entity_locks.entry(entity_id).or_default().clone()
    }

    /// Drop lock entries nobody holds or waits on
    pub(crate) fn prune_idle_locks(&self) {
        self.entity_locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}
