//! Store-level record shapes shared by adapters, the facade and the intent log.

use super::ids::{EntityId, EntityType, IntentId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Attribute name -> value map; one logical record or a slice of one
pub type Attributes = Map<String, Value>;

/// Identifies the intent a store write belongs to.
///
/// Adapters remember the highest sequence applied per entity and treat a stamp
/// at or below it as already applied, which makes retries idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntentStamp {
    pub intent_id: IntentId,
    pub sequence: u64,
}

impl IntentStamp {
    pub fn new(intent_id: IntentId, sequence: u64) -> Self {
        Self {
            intent_id,
            sequence,
        }
    }
}

/// Payload handed to [`StoreAdapter::put`](crate::stores::StoreAdapter::put)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreWrite {
    pub entity_type: EntityType,
    pub attributes: Attributes,
    pub stamp: IntentStamp,
}

/// One physical record held by one store for one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreRecord {
    pub entity_id: EntityId,
    pub entity_type: EntityType,
    pub attributes: Attributes,
    /// Intent that last modified this record
    pub last_intent: Option<IntentId>,
    /// Sequence of `last_intent`; writes at or below it are ignored
    pub sequence: u64,
    pub updated_at: DateTime<Utc>,
}

impl StoreRecord {
    pub fn from_write(entity_id: EntityId, write: StoreWrite) -> Self {
        Self {
            entity_id,
            entity_type: write.entity_type,
            attributes: write.attributes,
            last_intent: Some(write.stamp.intent_id),
            sequence: write.stamp.sequence,
            updated_at: Utc::now(),
        }
    }

    /// Whether `stamp` has already been applied to this record
    pub fn has_applied(&self, stamp: &IntentStamp) -> bool {
        self.last_intent == Some(stamp.intent_id) || self.sequence >= stamp.sequence
    }

    /// Merge a partial write into this record
    pub fn merge(&mut self, write: StoreWrite) {
        for (name, value) in write.attributes {
            self.attributes.insert(name, value);
        }
        self.entity_type = write.entity_type;
        self.last_intent = Some(write.stamp.intent_id);
        self.sequence = write.stamp.sequence;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(seq: u64, attrs: Value) -> StoreWrite {
        StoreWrite {
            entity_type: EntityType::new("field"),
            attributes: attrs.as_object().cloned().unwrap_or_default(),
            stamp: IntentStamp::new(IntentId::new(), seq),
        }
    }

    #[test]
    fn test_merge_keeps_untouched_attributes() {
        let mut record =
            StoreRecord::from_write(EntityId::new(), write(1, json!({"name": "North", "soil": "loam"})));
        record.merge(write(2, json!({"name": "North Field"})));

        assert_eq!(record.attributes["name"], json!("North Field"));
        assert_eq!(record.attributes["soil"], json!("loam"));
        assert_eq!(record.sequence, 2);
    }

    #[test]
    fn test_has_applied_compares_sequence() {
        let first = write(5, json!({"name": "a"}));
        let stamp = first.stamp;
        let record = StoreRecord::from_write(EntityId::new(), first);

        assert!(record.has_applied(&stamp));
        assert!(record.has_applied(&IntentStamp::new(IntentId::new(), 4)));
        assert!(!record.has_applied(&IntentStamp::new(IntentId::new(), 6)));
    }
}
