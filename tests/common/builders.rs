//! Small builders for farm entities used across the integration suites

use chrono::{NaiveDate, TimeZone, Utc};
use fieldkit_core::models::{
    Document, EntityId, Field, GeoPoint, GeoPolygon, Observation, Plant, PlantingEvent,
    SoilProfile, WeatherSample,
};
use fieldkit_core::test_helpers::TestHarness;

pub fn harness() -> TestHarness {
    TestHarness::new().expect("test harness should build")
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid calendar date")
}

pub fn square(origin_lat: f64, origin_lon: f64) -> GeoPolygon {
    GeoPolygon::new(vec![
        GeoPoint::new(origin_lat, origin_lon),
        GeoPoint::new(origin_lat, origin_lon + 0.01),
        GeoPoint::new(origin_lat + 0.01, origin_lon + 0.01),
        GeoPoint::new(origin_lat + 0.01, origin_lon),
    ])
}

pub fn field(name: &str) -> Field {
    Field::new(
        name,
        square(52.1, 5.2),
        SoilProfile {
            texture: "loam".to_string(),
            ph: Some(6.5),
            organic_matter_pct: Some(3.2),
        },
    )
    .with_notes(format!("{name} drains well after rain"))
}

pub fn plant(name: &str, family: &str) -> Plant {
    Plant::new(name, family).with_description(format!("{name} from the {family} family"))
}

pub fn planting(
    field_id: EntityId,
    family: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> PlantingEvent {
    PlantingEvent::new(field_id, EntityId::new(), family, start, end)
}

pub fn observation(content: &str) -> Observation {
    Observation::new("grower", content)
}

pub fn document(filename: &str, bytes: &[u8]) -> Document {
    Document::new(filename, "application/octet-stream", bytes.to_vec())
}

pub fn weather(field_id: EntityId, hour: u32) -> WeatherSample {
    let recorded_at = Utc
        .with_ymd_and_hms(2024, 6, 1, hour, 0, 0)
        .single()
        .expect("unambiguous timestamp");
    WeatherSample::new(recorded_at, 18.5, 0.4).for_field(field_id)
}
