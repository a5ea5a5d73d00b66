use super::{attribute_matches, type_matches, RecordTable};
use crate::constants::system::DEFAULT_MAX_BLOB_BYTES;
use crate::models::{Attributes, EntityId, IntentStamp, StoreRecord, StoreWrite};
use crate::stores::{
    PutOutcome, StoreAdapter, StoreCategory, StoreError, StoreFilter, StoreResult,
};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Binary payload size of an attribute map.
///
/// Byte arrays (serialized `Vec<u8>`) count one byte per element, strings their
/// UTF-8 length; anything else counts its JSON encoding.
pub(crate) fn payload_size(attributes: &Attributes) -> usize {
    attributes
        .values()
        .map(|value| match value {
            Value::Array(items) if items.iter().all(Value::is_u64) => items.len(),
            Value::String(s) => s.len(),
            Value::Null => 0,
            other => other.to_string().len(),
        })
        .sum()
}

/// Blob store for document and image content, with a per-write size limit
#[derive(Debug)]
pub struct MemoryBlobStore {
    table: RecordTable,
    max_bytes: usize,
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BLOB_BYTES)
    }
}

impl MemoryBlobStore {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            table: RecordTable::new(),
            max_bytes,
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }
}

#[async_trait]
impl StoreAdapter for MemoryBlobStore {
    fn category(&self) -> StoreCategory {
        StoreCategory::Blob
    }

    fn name(&self) -> &str {
        "memory-blob"
    }

    async fn put(&self, id: EntityId, data: StoreWrite) -> StoreResult<PutOutcome> {
        let size = payload_size(&data.attributes);
        if size > self.max_bytes {
            return Err(StoreError::PayloadTooLarge {
                size,
                limit: self.max_bytes,
            });
        }
        let (outcome, _) = self.table.upsert(id, data);
        debug!(entity_id = %id, size, ?outcome, "blob put");
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
