//! # Domain Model
//!
//! Canonical farm entities, independent of the stores they end up in, plus the
//! identifier and record types every layer shares.

pub mod document;
pub mod entity;
pub mod field;
pub mod geo;
pub mod ids;
pub mod observation;
pub mod plant;
pub mod planting_event;
pub mod plot;
pub mod record;
pub mod weather_sample;

pub use document::Document;
pub use entity::DomainEntity;
pub use field::{Field, SoilProfile};
pub use geo::{GeoPoint, GeoPolygon};
pub use ids::{EntityId, EntityType, IntentId};
pub use observation::Observation;
pub use plant::Plant;
pub use planting_event::PlantingEvent;
pub use plot::Plot;
pub use record::{Attributes, IntentStamp, StoreRecord, StoreWrite};
pub use weather_sample::WeatherSample;

use crate::registry::EntitySchema;

/// Entity type and schema for every built-in farm entity
pub fn farm_schemas() -> Vec<(EntityType, EntitySchema)> {
    vec![
        (Field::entity_type(), Field::schema()),
        (Plot::entity_type(), Plot::schema()),
        (PlantingEvent::entity_type(), PlantingEvent::schema()),
        (Plant::entity_type(), Plant::schema()),
        (Observation::entity_type(), Observation::schema()),
        (Document::entity_type(), Document::schema()),
        (WeatherSample::entity_type(), WeatherSample::schema()),
    ]
}
