//! # Intent Log
//!
//! Durable storage for write intents. A record is appended before any store
//! is written and updated after every apply attempt, so a restarted process can
//! resume every PENDING intent from the log alone.

mod file;
mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use file::FileIntentLog;
pub use memory::MemoryIntentLog;
#[cfg(feature = "postgres")]
pub use postgres::PgIntentLog;

use super::errors::IntentLogResult;
use super::intent::{IntentRecord, IntentStatus};
use crate::models::{EntityId, IntentId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;

#[async_trait]
pub trait IntentLog: Send + Sync + fmt::Debug {
    fn backend(&self) -> &'static str;

    /// Next global intent sequence number. Never repeats within one log.
    async fn next_sequence(&self) -> IntentLogResult<u64>;

    /// Durably record a new intent. Must complete before any store is written.
    async fn append(&self, record: &IntentRecord) -> IntentLogResult<()>;

    /// Replace the stored state of an existing intent
    async fn update(&self, record: &IntentRecord) -> IntentLogResult<()>;

    async fn get(&self, intent_id: IntentId) -> IntentLogResult<Option<IntentRecord>>;

    /// All PENDING intents in sequence order
    async fn pending(&self) -> IntentLogResult<Vec<IntentRecord>>;

    /// PENDING intents of one entity in sequence order
    async fn pending_for_entity(&self, entity_id: EntityId) -> IntentLogResult<Vec<IntentRecord>>;

    /// PENDING and FAILED intents of one entity in sequence order. FAILED
    /// intents can still be requeued, so writers treat them as in flight.
    async fn open_for_entity(&self, entity_id: EntityId) -> IntentLogResult<Vec<IntentRecord>>;

    /// Intents with the given status in sequence order
    async fn by_status(&self, status: IntentStatus) -> IntentLogResult<Vec<IntentRecord>>;

    /// Drop COMPLETE intents last updated before `cutoff`, returning how many
    /// were removed. Logs that recover their sequence from stored intents
    /// keep the highest-sequence intent so a reopened log never reuses one.
    async fn prune_completed(&self, cutoff: DateTime<Utc>) -> IntentLogResult<usize>;
}
