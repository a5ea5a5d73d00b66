use super::entity::DomainEntity;
use super::ids::EntityId;
use crate::constants::entity_types;
use crate::registry::EntitySchema;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamped weather reading. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSample {
    pub id: EntityId,
    #[serde(default)]
    pub field_id: Option<EntityId>,
    pub recorded_at: DateTime<Utc>,
    pub temperature_c: f64,
    pub rainfall_mm: f64,
    #[serde(default)]
    pub humidity_pct: Option<f64>,
    #[serde(default)]
    pub wind_speed_ms: Option<f64>,
}

impl WeatherSample {
    pub fn new(recorded_at: DateTime<Utc>, temperature_c: f64, rainfall_mm: f64) -> Self {
        Self {
            id: EntityId::new(),
            field_id: None,
            recorded_at,
            temperature_c,
            rainfall_mm,
            humidity_pct: None,
            wind_speed_ms: None,
        }
    }

    pub fn for_field(mut self, field_id: EntityId) -> Self {
        self.field_id = Some(field_id);
        self
    }
}

impl DomainEntity for WeatherSample {
    const ENTITY_TYPE: &'static str = entity_types::WEATHER_SAMPLE;

    fn id(&self) -> EntityId {
        self.id
    }

    fn schema() -> EntitySchema {
        EntitySchema::builder()
            .timeseries(&[
                "field_id",
                "recorded_at",
                "temperature_c",
                "rainfall_mm",
                "humidity_pct",
                "wind_speed_ms",
            ])
            .immutable()
            .build()
    }

    fn validate(&self) -> Result<(), String> {
        if self.rainfall_mm < 0.0 {
            return Err(format!("Rainfall cannot be negative: {}", self.rainfall_mm));
        }
        if let Some(humidity) = self.humidity_pct {
            if !(0.0..=100.0).contains(&humidity) {
                return Err(format!("Humidity out of range: {humidity}"));
            }
        }
        Ok(())
    }
}
