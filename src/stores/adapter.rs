//! # Store Adapter Contract
//!
//! The minimal interface every specialized store exposes. The router and facade
//! depend on this trait only, never on the technology behind it.

use super::category::StoreCategory;
use super::errors::StoreResult;
use super::filter::StoreFilter;
use crate::models::{EntityId, IntentStamp, StoreRecord, StoreWrite};
use async_trait::async_trait;
use std::fmt;

/// Result of an idempotent put
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The write changed the stored record
    Applied,
    /// The intent stamp was already applied; nothing changed
    AlreadyApplied,
}

#[async_trait]
pub trait StoreAdapter: Send + Sync + fmt::Debug {
    fn category(&self) -> StoreCategory;

    /// Human readable adapter name for route listings and logs
    fn name(&self) -> &str;

    /// Merge `data` into the record for `id`. Must be idempotent per intent stamp.
    async fn put(&self, id: EntityId, data: StoreWrite) -> StoreResult<PutOutcome>;

    async fn get(&self, id: EntityId) -> StoreResult<Option<StoreRecord>>;

    /// Remove the record for `id`. Returns whether a record existed.
    async fn delete(&self, id: EntityId, stamp: IntentStamp) -> StoreResult<bool>;

    async fn query(&self, filter: &StoreFilter) -> StoreResult<Vec<StoreRecord>>;
}
