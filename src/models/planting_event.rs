use super::entity::DomainEntity;
use super::ids::EntityId;
use crate::constants::entity_types;
use crate::registry::EntitySchema;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A crop occupying a field (optionally a plot) between two dates.
///
/// `plant_family` is denormalized from the plant so the rotation guard can check
/// conflicts with a single structured-store query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantingEvent {
    pub id: EntityId,
    pub field_id: EntityId,
    #[serde(default)]
    pub plot_id: Option<EntityId>,
    pub plant_id: EntityId,
    pub plant_family: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub notes: String,
}

impl PlantingEvent {
    pub fn new(
        field_id: EntityId,
        plant_id: EntityId,
        plant_family: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            id: EntityId::new(),
            field_id,
            plot_id: None,
            plant_id,
            plant_family: plant_family.into(),
            start_date,
            end_date,
            notes: String::new(),
        }
    }

    pub fn in_plot(mut self, plot_id: EntityId) -> Self {
        self.plot_id = Some(plot_id);
        self
    }
}

impl DomainEntity for PlantingEvent {
    const ENTITY_TYPE: &'static str = entity_types::PLANTING_EVENT;

    fn id(&self) -> EntityId {
        self.id
    }

    fn schema() -> EntitySchema {
        EntitySchema::builder()
            .structured(&[
                "field_id",
                "plot_id",
                "plant_id",
                "plant_family",
                "start_date",
                "end_date",
            ])
            .search(&["notes"])
            .build()
    }

    fn validate(&self) -> Result<(), String> {
        if self.end_date < self.start_date {
            return Err(format!(
                "Planting event ends ({}) before it starts ({})",
                self.end_date, self.start_date
            ));
        }
        Ok(())
    }
}
