use super::{attribute_matches, type_matches, RecordTable};
use crate::constants::attributes::RECORDED_AT;
use crate::models::{EntityId, IntentStamp, StoreRecord, StoreWrite};
use crate::stores::{
    PutOutcome, StoreAdapter, StoreCategory, StoreError, StoreFilter, StoreResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

#[derive(Debug, Default)]
struct TimeIndex {
    by_time: BTreeSet<(DateTime<Utc>, EntityId)>,
    by_entity: HashMap<EntityId, DateTime<Utc>>,
}

impl TimeIndex {
    fn insert(&mut self, id: EntityId, at: DateTime<Utc>) {
        self.remove(&id);
        self.by_time.insert((at, id));
        self.by_entity.insert(id, at);
    }

    fn remove(&mut self, id: &EntityId) {
        if let Some(at) = self.by_entity.remove(id) {
            self.by_time.remove(&(at, *id));
        }
    }

    fn range(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<EntityId> {
        if from >= to {
            return Vec::new();
        }
        self.by_time
            .range((from, EntityId::from_uuid(uuid::Uuid::nil()))..)
            .take_while(|(at, _)| *at < to)
            .map(|(_, id)| *id)
            .collect()
    }
}

/// Time-series store: records are ordered by a timestamp attribute.
///
/// The timestamp comes from `time_attribute` (default `recorded_at`), falling back
/// to the record's write time when the attribute is missing or unparseable.
#[derive(Debug)]
pub struct MemoryTimeSeriesStore {
    table: RecordTable,
    index: RwLock<TimeIndex>,
    time_attribute: String,
}

impl Default for MemoryTimeSeriesStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTimeSeriesStore {
    pub fn new() -> Self {
        Self::with_time_attribute(RECORDED_AT)
    }

    pub fn with_time_attribute(attribute: impl Into<String>) -> Self {
        Self {
            table: RecordTable::new(),
            index: RwLock::new(TimeIndex::default()),
            time_attribute: attribute.into(),
        }
    }

    fn timestamp_of(&self, record: &StoreRecord) -> DateTime<Utc> {
        record
            .attributes
            .get(&self.time_attribute)
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(record.updated_at)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StoreAdapter for MemoryTimeSeriesStore {
    fn category(&self) -> StoreCategory {
        StoreCategory::TimeSeries
    }

    fn name(&self) -> &str {
        "memory-timeseries"
    }

    async fn put(&self, id: EntityId, data: StoreWrite) -> StoreResult<PutOutcome> {
        let (outcome, record) = self.table.upsert(id, data);
        if let (PutOutcome::Applied, Some(record)) = (outcome, record) {
            let at = self.timestamp_of(&record);
            self.index.write().insert(id, at);
        }
        debug!(entity_id = %id, ?outcome, "timeseries put");
        Ok(outcome)
    }

    async fn get(&self, id: EntityId) -> StoreResult<Option<StoreRecord>> {
        Ok(self.table.get(&id))
    }

    async fn delete(&self, id: EntityId, stamp: IntentStamp) -> StoreResult<bool> {
        let removed = self.table.delete(id, stamp).is_some();
        if removed {
            self.index.write().remove(&id);
        }
        Ok(removed)
    }

    async fn query(&self, filter: &StoreFilter) -> StoreResult<Vec<StoreRecord>> {
        match filter {
            StoreFilter::TimeRange {
                entity_type,
                from,
                to,
            } => {
                let ids = self.index.read().range(*from, *to);
                Ok(ids
                    .into_iter()
                    .filter_map(|id| self.table.get(&id))
                    .filter(|r| type_matches(r, entity_type.as_ref()))
                    .collect())
            }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityType, IntentId};
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn sample(seq: u64, at: DateTime<Utc>) -> StoreWrite {
        StoreWrite {
            entity_type: EntityType::new("weather_sample"),
            attributes: json!({ "recorded_at": at, "rainfall_mm": 1.5 })
                .as_object()
                .cloned()
                .unwrap(),
            stamp: IntentStamp::new(IntentId::new(), seq),
        }
    }

    #[tokio::test]
    async fn test_time_range_is_half_open_and_ordered() {
        let store = MemoryTimeSeriesStore::new();
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let ids: Vec<EntityId> = (0..4).map(|_| EntityId::new()).collect();
        for (i, id) in ids.iter().enumerate().rev() {
            store
                .put(*id, sample(i as u64 + 1, base + Duration::hours(i as i64)))
                .await
                .unwrap();
        }

        let hits = store
            .query(&StoreFilter::TimeRange {
                entity_type: None,
                from: base + Duration::hours(1),
                to: base + Duration::hours(3),
            })
            .await
            .unwrap();
        let got: Vec<EntityId> = hits.iter().map(|r| r.entity_id).collect();
        assert_eq!(got, vec![ids[1], ids[2]]);
    }

    #[tokio::test]
    async fn test_replayed_stamp_does_not_duplicate_points() {
        let store = MemoryTimeSeriesStore::new();
        let id = EntityId::new();
        let write = sample(7, Utc::now());

        assert_eq!(store.put(id, write.clone()).await.unwrap(), PutOutcome::Applied);
        assert_eq!(store.put(id, write).await.unwrap(), PutOutcome::AlreadyApplied);
        assert_eq!(store.len(), 1);
    }
}
