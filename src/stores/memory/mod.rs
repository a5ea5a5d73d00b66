//! In-memory reference adapters.
//!
//! All four share [`RecordTable`], which implements the idempotent
//! merge-by-sequence rule; each adapter adds the indexing its category needs.
//! Deletes leave a tombstone carrying the delete sequence, so a put stamped
//! before the delete cannot bring the entity back.

mod blob;
mod search;
mod structured;
mod timeseries;

pub use blob::MemoryBlobStore;
pub use search::MemorySearchStore;
pub use structured::MemoryStructuredStore;
pub use timeseries::MemoryTimeSeriesStore;

use crate::models::{EntityId, EntityType, IntentStamp, StoreRecord, StoreWrite};
use crate::stores::PutOutcome;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;

#[derive(Debug, Default)]
pub(crate) struct RecordTable {
    records: DashMap<EntityId, StoreRecord>,
    /// Sequence of the latest delete per removed entity
    tombstones: DashMap<EntityId, u64>,
}

impl RecordTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Apply a write, returning the outcome and the stored record. A write
    /// superseded by a delete reports `AlreadyApplied` with no record.
    pub(crate) fn upsert(&self, id: EntityId, write: StoreWrite) -> (PutOutcome, Option<StoreRecord>) {
        match self.records.entry(id) {
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                if record.has_applied(&write.stamp) {
                    return (PutOutcome::AlreadyApplied, Some(record.clone()));
                }
                record.merge(write);
                (PutOutcome::Applied, Some(record.clone()))
            }
            Entry::Vacant(vacant) => {
                if self
                    .tombstones
                    .get(&id)
                    .is_some_and(|deleted| *deleted >= write.stamp.sequence)
                {
                    return (PutOutcome::AlreadyApplied, None);
                }
                self.tombstones.remove(&id);
                let record = StoreRecord::from_write(id, write);
                vacant.insert(record.clone());
                (PutOutcome::Applied, Some(record))
            }
        }
    }

    /// Apply a delete, returning the removed record. A record written after
    /// the delete's sequence is kept.
    pub(crate) fn delete(&self, id: EntityId, stamp: IntentStamp) -> Option<StoreRecord> {
        self.tombstones
            .entry(id)
            .and_modify(|deleted| *deleted = (*deleted).max(stamp.sequence))
            .or_insert(stamp.sequence);
        self.records
            .remove_if(&id, |_, record| record.sequence <= stamp.sequence)
            .map(|(_, record)| record)
    }

    pub(crate) fn get(&self, id: &EntityId) -> Option<StoreRecord> {
        self.records.get(id).map(|r| r.value().clone())
    }

    /// Records matching `predicate`, ordered by entity id for stable output
    pub(crate) fn scan(&self, predicate: impl Fn(&StoreRecord) -> bool) -> Vec<StoreRecord> {
        let mut out: Vec<StoreRecord> = self
            .records
            .iter()
            .filter(|r| predicate(r.value()))
            .map(|r| r.value().clone())
            .collect();
        out.sort_by_key(|r| r.entity_id);
        out
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}

pub(crate) fn type_matches(record: &StoreRecord, entity_type: Option<&EntityType>) -> bool {
    entity_type.map_or(true, |t| &record.entity_type == t)
}

pub(crate) fn attribute_matches(record: &StoreRecord, attribute: &str, value: &Value) -> bool {
    record.attributes.get(attribute) == Some(value)
}
