use super::{attribute_matches, type_matches, RecordTable};
use crate::models::{EntityId, IntentStamp, StoreRecord, StoreWrite};
use crate::stores::{
    PutOutcome, StoreAdapter, StoreCategory, StoreError, StoreFilter, StoreResult,
};
use async_trait::async_trait;
use tracing::debug;

/// Structured-facts store: exact-match lookups by type and attribute
#[derive(Debug, Default)]
pub struct MemoryStructuredStore {
    table: RecordTable,
}

impl MemoryStructuredStore {
    pub fn new() -> Self {
        Self {
            table: RecordTable::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StoreAdapter for MemoryStructuredStore {
    fn category(&self) -> StoreCategory {
        StoreCategory::Structured
    }

    fn name(&self) -> &str {
        "memory-structured"
    }

    async fn put(&self, id: EntityId, data: StoreWrite) -> StoreResult<PutOutcome> {
        let (outcome, _) = self.table.upsert(id, data);
        debug!(entity_id = %id, ?outcome, "structured put");
        Ok(outcome)
    }

    async fn get(&self, id: EntityId) -> StoreResult<Option<StoreRecord>> {
        Ok(self.table.get(&id))
    }

    async fn delete(&self, id: EntityId, stamp: IntentStamp) -> StoreResult<bool> {
        Ok(self.table.delete(id, stamp).is_some())
    }

    async fn query(&self, filter: &StoreFilter) -> StoreResult<Vec<StoreRecord>> {
        match filter {
            StoreFilter::EntityType { entity_type } => {
                Ok(self.table.scan(|r| &r.entity_type == entity_type))
            }
            StoreFilter::AttributeEquals {
                entity_type,
                attribute,
                value,
            } => Ok(self.table.scan(|r| {
                type_matches(r, entity_type.as_ref()) && attribute_matches(r, attribute, value)
            })),
            other => Err(StoreError::UnsupportedFilter {
                store: self.category(),
                filter: other.name(),
            }),
        }
    }
}
