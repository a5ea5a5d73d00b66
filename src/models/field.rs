use super::entity::DomainEntity;
use super::geo::GeoPolygon;
use super::ids::EntityId;
use crate::constants::entity_types;
use crate::registry::EntitySchema;
use serde::{Deserialize, Serialize};

/// Soil metadata recorded for a field
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SoilProfile {
    pub texture: String,
    #[serde(default)]
    pub ph: Option<f64>,
    #[serde(default)]
    pub organic_matter_pct: Option<f64>,
}

/// A farm field: boundary and soil facts in the structured store, notes in search.
///
/// Crop-rotation history is not stored on the field itself; it is the set of
/// planting events referencing the field's id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub id: EntityId,
    pub name: String,
    pub boundary: GeoPolygon,
    pub soil: SoilProfile,
    #[serde(default)]
    pub notes: String,
}

impl Field {
    pub fn new(name: impl Into<String>, boundary: GeoPolygon, soil: SoilProfile) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            boundary,
            soil,
            notes: String::new(),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }
}

impl DomainEntity for Field {
    const ENTITY_TYPE: &'static str = entity_types::FIELD;

    fn id(&self) -> EntityId {
        self.id
    }

    fn schema() -> EntitySchema {
        EntitySchema::builder()
            .structured(&["name", "boundary", "soil"])
            .search(&["notes"])
            .build()
    }

    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Field name cannot be empty".to_string());
        }
        if let Some(ph) = self.soil.ph {
            if !(0.0..=14.0).contains(&ph) {
                return Err(format!("Soil pH out of range: {ph}"));
            }
        }
        self.boundary.validate()
    }
}
