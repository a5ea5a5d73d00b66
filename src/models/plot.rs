use super::entity::DomainEntity;
use super::geo::GeoPolygon;
use super::ids::EntityId;
use crate::constants::entity_types;
use crate::registry::EntitySchema;
use serde::{Deserialize, Serialize};

/// Sub-division of a field (bed, strip, greenhouse row)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plot {
    pub id: EntityId,
    pub field_id: EntityId,
    pub name: String,
    pub boundary: GeoPolygon,
    #[serde(default)]
    pub notes: String,
}

impl Plot {
    pub fn new(field_id: EntityId, name: impl Into<String>, boundary: GeoPolygon) -> Self {
        Self {
            id: EntityId::new(),
            field_id,
            name: name.into(),
            boundary,
            notes: String::new(),
        }
    }
}

impl DomainEntity for Plot {
    const ENTITY_TYPE: &'static str = entity_types::PLOT;

    fn id(&self) -> EntityId {
        self.id
    }

    fn schema() -> EntitySchema {
        EntitySchema::builder()
            .structured(&["field_id", "name", "boundary"])
            .search(&["notes"])
            .build()
    }

    fn validate(&self) -> Result<(), String> {
        self.boundary.validate()
    }
}
