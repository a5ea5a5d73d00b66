//! # Background Reconciler
//!
//! Polls the intent log at a fixed interval and retries every PENDING intent
//! whose backoff has elapsed. Entities are reconciled concurrently; intents of
//! one entity are retried strictly in sequence order through the coordinator.
//! COMPLETE intents older than the retention period are pruned from the log
//! at most once per retention period.

use super::coordinator::ConsistencyCoordinator;
use super::intent::{IntentRecord, IntentStatus};
use crate::constants::system;
use crate::error::{FieldkitError, FieldkitResult};
use crate::models::EntityId;
use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub entities: usize,
    pub attempted: usize,
    pub completed: usize,
    pub still_pending: usize,
    pub failed: usize,
    pub errors: usize,
    /// COMPLETE intents removed from the log during this pass
    pub pruned: usize,
}

impl ReconcileReport {
    fn record(&mut self, intents: &[IntentRecord]) {
        self.attempted += intents.len();
        for intent in intents {
            match intent.status {
                IntentStatus::Complete => self.completed += 1,
                IntentStatus::Pending => self.still_pending += 1,
                IntentStatus::Failed => self.failed += 1,
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    coordinator: Arc<ConsistencyCoordinator>,
    poll_interval: Duration,
    retention: Duration,
    last_prune: Arc<Mutex<Option<Instant>>>,
}

impl Reconciler {
    pub fn new(coordinator: Arc<ConsistencyCoordinator>, poll_interval: Duration) -> Self {
        Self {
            coordinator,
            poll_interval,
            retention: Duration::from_millis(system::DEFAULT_COMPLETED_RETENTION_MS),
            last_prune: Arc::new(Mutex::new(None)),
        }
    }

    /// Keep COMPLETE intents for `retention` before pruning them
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Remove COMPLETE intents last updated more than `retention` ago
    pub async fn prune_completed(&self) -> FieldkitResult<usize> {
        let Ok(retention) = chrono::Duration::from_std(self.retention) else {
            return Ok(0);
        };
        let cutoff = Utc::now() - retention;
        let pruned = self.coordinator.intent_log().prune_completed(cutoff).await?;
        *self.last_prune.lock() = Some(Instant::now());
        if pruned > 0 {
            debug!(pruned, "Pruned completed intents");
        }
        Ok(pruned)
    }

    async fn prune_if_due(&self) -> usize {
        let period = self.retention.max(self.poll_interval);
        let last_prune = *self.last_prune.lock();
        let due = last_prune.map_or(true, |last| last.elapsed() >= period);
        if !due {
            return 0;
        }
        match self.prune_completed().await {
            Ok(pruned) => pruned,
            Err(e) => {
                warn!(error = %e, "Pruning completed intents failed");
                0
            }
        }
    }

    /// Retry every intent whose backoff has elapsed
    pub async fn run_once(&self) -> FieldkitResult<ReconcileReport> {
        self.pass(false).await
    }

    /// Retry every PENDING intent now, ignoring backoff schedules
    pub async fn reconcile_all(&self) -> FieldkitResult<ReconcileReport> {
        self.pass(true).await
    }

    async fn pass(&self, force: bool) -> FieldkitResult<ReconcileReport> {
        let pending = self.coordinator.pending_intents().await?;
        let now = Utc::now();

        // Only the head intent of each entity decides whether that entity is due
        let mut seen = HashSet::new();
        let entities: Vec<EntityId> = pending
            .iter()
            .filter(|intent| seen.insert(intent.entity_id))
            .filter(|head| force || head.is_due(now))
            .map(|head| head.entity_id)
            .collect();

        let mut report = ReconcileReport {
            entities: entities.len(),
            ..Default::default()
        };
        if entities.is_empty() {
            report.pruned = self.prune_if_due().await;
            return Ok(report);
        }

        let results = join_all(
            entities
                .iter()
                .map(|entity_id| self.coordinator.reconcile_entity(*entity_id, force)),
        )
        .await;

        for (entity_id, result) in entities.iter().zip(results) {
            match result {
                Ok(intents) => report.record(&intents),
                Err(e) => {
                    report.errors += 1;
                    warn!(entity_id = %entity_id, error = %e, "Reconciliation of entity failed");
                }
            }
        }
        self.coordinator.prune_idle_locks();
        report.pruned = self.prune_if_due().await;

        debug!(
            entities = report.entities,
            attempted = report.attempted,
            completed = report.completed,
            still_pending = report.still_pending,
            failed = report.failed,
            pruned = report.pruned,
            "Reconciliation pass finished"
        );
        Ok(report)
    }

    /// Run passes on `poll_interval` until the returned handle is shut down
    pub fn spawn(self) -> ReconcilerHandle {
        let (shutdown_sender, mut shutdown_receiver) = oneshot::channel::<()>();
        let interval = self.poll_interval;

        let join_handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(poll_interval_ms = interval.as_millis() as u64, "🔁 Reconciler started");

            loop {
                tokio::select! {
                    _ = &mut shutdown_receiver => break,
                    _ = ticker.tick() => {
                        match self.run_once().await {
                            Ok(report) if report.attempted > 0 => info!(
                                attempted = report.attempted,
                                completed = report.completed,
                                failed = report.failed,
                                "Reconciler retried pending intents"
                            ),
                            Ok(_) => {}
                            Err(e) => error!(error = %e, "Reconciliation pass failed"),
                        }
                    }
                }
            }
            info!("🛑 Reconciler stopped");
        });

        ReconcilerHandle {
            shutdown_sender: Some(shutdown_sender),
            join_handle: Some(join_handle),
        }
    }
}

/// Handle to a running background reconciler
#[derive(Debug)]
pub struct ReconcilerHandle {
    shutdown_sender: Option<oneshot::Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
}

impl ReconcilerHandle {
    pub fn is_running(&self) -> bool {
        self.join_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop after the current pass and wait for the task to exit
    pub async fn shutdown(&mut self) -> FieldkitResult<()> {
        if let Some(sender) = self.shutdown_sender.take() {
            // The task may already have exited; joining below reports that
            let _ = sender.send(());
        }
        if let Some(handle) = self.join_handle.take() {
            handle
                .await
                .map_err(|e| FieldkitError::Shutdown(format!("Reconciler task failed: {e}")))?;
        }
        Ok(())
    }
}

impl Drop for ReconcilerHandle {
    fn drop(&mut self) {
        if let Some(sender) = self.shutdown_sender.take() {
            let _ = sender.send(());
        }
    }
}
