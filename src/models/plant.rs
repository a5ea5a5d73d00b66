use super::entity::DomainEntity;
use super::ids::EntityId;
use crate::constants::entity_types;
use crate::registry::EntitySchema;
use serde::{Deserialize, Serialize};

/// Crop taxonomy entry. `family` drives rotation rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plant {
    pub id: EntityId,
    pub name: String,
    pub family: String,
    #[serde(default)]
    pub description: String,
}

impl Plant {
    pub fn new(name: impl Into<String>, family: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            family: family.into(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl DomainEntity for Plant {
    const ENTITY_TYPE: &'static str = entity_types::PLANT;

    fn id(&self) -> EntityId {
        self.id
    }

    fn schema() -> EntitySchema {
        EntitySchema::builder()
            .structured(&["name", "family"])
            .search(&["description"])
            .build()
    }

    fn validate(&self) -> Result<(), String> {
        if self.family.trim().is_empty() {
            return Err("Plant family cannot be empty".to_string());
        }
        Ok(())
    }
}
