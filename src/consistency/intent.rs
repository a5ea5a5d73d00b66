//! # Write Intents
//!
//! An intent is the durable record of one logical write: which entity, which
//! stores, what payload, and how far it got. It is persisted before any store
//! is touched and marked complete only once every target acknowledged.

use crate::models::{Attributes, EntityId, EntityType, IntentId, IntentStamp};
use crate::routing::SubWrite;
use crate::stores::StoreCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    /// Recorded, not yet acknowledged by every target store
    Pending,
    /// Every target store acknowledged
    Complete,
    /// Retries exhausted; waiting for an operator
    Failed,
}

impl IntentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

impl fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Complete => write!(f, "complete"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for IntentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "complete" => Ok(Self::Complete),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid intent status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentOperation {
    Put,
    Delete,
}

impl fmt::Display for IntentOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Put => write!(f, "put"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Per-store slice of an intent and whether that store acknowledged it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetWrite {
    pub store: StoreCategory,
    /// Empty for deletes
    #[serde(default)]
    pub attributes: Attributes,
    pub acknowledged: bool,
    #[serde(default)]
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentRecord {
    pub intent_id: IntentId,
    /// Global, monotonically increasing; orders intents and stamps store writes
    pub sequence: u64,
    pub entity_id: EntityId,
    pub entity_type: EntityType,
    pub operation: IntentOperation,
    /// Targets in fixed store order
    pub targets: Vec<TargetWrite>,
    pub status: IntentStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Earliest time the reconciler may retry this intent
    pub next_attempt_at: DateTime<Utc>,
}

impl IntentRecord {
    pub fn put(
        sequence: u64,
        entity_id: EntityId,
        entity_type: EntityType,
        writes: Vec<SubWrite>,
    ) -> Self {
        let targets = writes
            .into_iter()
            .map(|write| TargetWrite {
                store: write.category,
                attributes: write.attributes,
                acknowledged: false,
                last_error: None,
            })
            .collect();
        Self::with_targets(sequence, entity_id, entity_type, IntentOperation::Put, targets)
    }

    pub fn delete(
        sequence: u64,
        entity_id: EntityId,
        entity_type: EntityType,
        stores: impl IntoIterator<Item = StoreCategory>,
    ) -> Self {
        let targets = stores
            .into_iter()
            .map(|store| TargetWrite {
                store,
                attributes: Attributes::new(),
                acknowledged: false,
                last_error: None,
            })
            .collect();
        Self::with_targets(sequence, entity_id, entity_type, IntentOperation::Delete, targets)
    }

    fn with_targets(
        sequence: u64,
        entity_id: EntityId,
        entity_type: EntityType,
        operation: IntentOperation,
        mut targets: Vec<TargetWrite>,
    ) -> Self {
        targets.sort_by_key(|t| t.store);
        let now = Utc::now();
        Self {
            intent_id: IntentId::new(),
            sequence,
            entity_id,
            entity_type,
            operation,
            targets,
            status: IntentStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
            next_attempt_at: now,
        }
    }

    pub fn stamp(&self) -> IntentStamp {
        IntentStamp::new(self.intent_id, self.sequence)
    }

    pub fn target_stores(&self) -> Vec<StoreCategory> {
        self.targets.iter().map(|t| t.store).collect()
    }

    pub fn acknowledged_stores(&self) -> Vec<StoreCategory> {
        self.targets
            .iter()
            .filter(|t| t.acknowledged)
            .map(|t| t.store)
            .collect()
    }

    pub fn pending_stores(&self) -> Vec<StoreCategory> {
        self.targets
            .iter()
            .filter(|t| !t.acknowledged)
            .map(|t| t.store)
            .collect()
    }

    pub fn all_acknowledged(&self) -> bool {
        self.targets.iter().all(|t| t.acknowledged)
    }

    /// Whether the reconciler may retry this intent at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == IntentStatus::Pending && self.next_attempt_at <= now
    }
}
