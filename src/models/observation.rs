use super::entity::DomainEntity;
use super::ids::EntityId;
use crate::constants::entity_types;
use crate::registry::EntitySchema;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Free-text note, optionally attached to any other entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: EntityId,
    #[serde(default)]
    pub attached_to: Option<EntityId>,
    pub author: String,
    pub observed_at: DateTime<Utc>,
    pub content: String,
}

impl Observation {
    pub fn new(author: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            attached_to: None,
            author: author.into(),
            observed_at: Utc::now(),
            content: content.into(),
        }
    }

    pub fn attached_to(mut self, entity_id: EntityId) -> Self {
        self.attached_to = Some(entity_id);
        self
    }
}

impl DomainEntity for Observation {
    const ENTITY_TYPE: &'static str = entity_types::OBSERVATION;

    fn id(&self) -> EntityId {
        self.id
    }

    fn schema() -> EntitySchema {
        EntitySchema::builder()
            .structured(&["attached_to", "author", "observed_at"])
            .search(&["content"])
            .build()
    }
}
