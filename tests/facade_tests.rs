//! Unified query facade tests: merged reads, typed round trips, search,
//! listing and the immutability and delete policies.

mod common;

use common::*;
use fieldkit_core::consistency::IntentStatus;
use fieldkit_core::models::{
    Document, DomainEntity, EntityId, EntityType, Field, Observation, Plant, WeatherSample,
};
use fieldkit_core::stores::StoreCategory;
use fieldkit_core::test_helpers::FaultMode;
use fieldkit_core::FieldkitError;
use serde_json::json;

#[tokio::test]
async fn typed_entities_round_trip_through_every_store() {
    let harness = harness();

    let field = field("North Field");
    let receipt = harness.facade.save(&field).await.unwrap();
    assert!(receipt.is_complete());
    assert_eq!(
        receipt.acknowledged,
        vec![StoreCategory::Structured, StoreCategory::Search]
    );

    let loaded: Field = harness.facade.load(field.id).await.unwrap();
    assert_eq!(loaded, field);

    let doc = document("soil-report.pdf", b"%PDF-1.7 soil").with_caption("spring soil report");
    harness.facade.save(&doc).await.unwrap();
    let loaded: Document = harness.facade.load(doc.id).await.unwrap();
    assert_eq!(loaded.content, doc.content);
    assert_eq!(loaded.caption, "spring soil report");
}

#[tokio::test]
async fn read_merges_only_owned_attributes_per_store() {
    let harness = harness();
    let field = field("Creek Field");
    harness.facade.save(&field).await.unwrap();

    let view = harness.facade.read(field.id).await.unwrap();

    assert!(view.is_found());
    assert!(!view.is_incomplete());
    assert_eq!(view.entity_type, Some(EntityType::new("field")));
    assert_eq!(view.attributes["name"], json!("Creek Field"));
    assert_eq!(view.attributes["notes"], json!("Creek Field drains well after rain"));
    assert!(!view.attributes.contains_key("id"));
    assert_eq!(view.sources.len(), 2);
}

#[tokio::test]
async fn partial_write_updates_only_named_attributes() {
    let harness = harness();
    let field = field("Hill Field");
    harness.facade.save(&field).await.unwrap();

    let update = json!({ "notes": "terraced in 2024" }).as_object().cloned().unwrap();
    harness
        .facade
        .write(&Field::entity_type(), field.id, update)
        .await
        .unwrap();

    let loaded: Field = harness.facade.load(field.id).await.unwrap();
    assert_eq!(loaded.notes, "terraced in 2024");
    assert_eq!(loaded.name, "Hill Field");
    assert_eq!(loaded.soil, field.soil);
}

#[tokio::test]
async fn unknown_attribute_rejects_the_write_before_any_store() {
    let harness = harness();
    let attributes = json!({ "name": "Bad", "colour": "green" })
        .as_object()
        .cloned()
        .unwrap();

    let result = harness
        .facade
        .write(&Field::entity_type(), EntityId::new(), attributes)
        .await;

    assert_eq!(result.unwrap_err().kind(), "routing_error");
    assert_eq!(harness.stores.structured.put_calls(), 0);
    assert!(harness.coordinator.pending_intents().await.unwrap().is_empty());
}

#[tokio::test]
async fn id_and_empty_writes_are_rejected() {
    let harness = harness();
    let id = EntityId::new();

    let empty = harness
        .facade
        .write(&Field::entity_type(), id, Default::default())
        .await;
    assert!(matches!(empty, Err(FieldkitError::Validation(_))));

    let with_id = json!({ "id": id, "name": "x" }).as_object().cloned().unwrap();
    let result = harness.facade.write(&Field::entity_type(), id, with_id).await;
    assert!(matches!(result, Err(FieldkitError::Validation(_))));
}

#[tokio::test]
async fn save_runs_entity_validation() {
    let harness = harness();
    let result = harness.facade.save(&Plant::new("Kale", "  ")).await;

    assert!(matches!(result, Err(FieldkitError::Validation(_))));
    assert_eq!(harness.stores.structured.put_calls(), 0);
}

#[tokio::test]
async fn unavailable_store_yields_an_incomplete_view() {
    let harness = harness();
    let field = field("West Field");
    harness.facade.save(&field).await.unwrap();

    harness.stores.search.set_mode(FaultMode::Failing);
    let view = harness.facade.read(field.id).await.unwrap();

    assert!(view.is_found());
    assert!(view.is_incomplete());
    assert_eq!(view.unavailable_stores, vec![StoreCategory::Search]);
    assert_eq!(view.attributes["name"], json!("West Field"));
    assert!(!view.attributes.contains_key("notes"));

    let typed = harness.facade.load::<Field>(field.id).await;
    assert!(matches!(typed, Err(FieldkitError::IncompleteRead { .. })));
}

#[tokio::test]
async fn missing_entities_read_empty_and_load_not_found() {
    let harness = harness();
    let id = EntityId::new();

    let view = harness.facade.read(id).await.unwrap();
    assert!(!view.is_found());
    assert!(view.attributes.is_empty());

    let typed = harness.facade.load::<Field>(id).await;
    assert!(matches!(typed, Err(FieldkitError::NotFound(found)) if found == id));
}

#[tokio::test]
async fn load_as_the_wrong_type_is_rejected() {
    let harness = harness();
    let plant = plant("Kale", "Brassicaceae");
    harness.facade.save(&plant).await.unwrap();

    let result = harness.facade.load::<Field>(plant.id).await;
    assert!(matches!(result, Err(FieldkitError::Validation(_))));
}

#[tokio::test]
async fn search_hits_are_augmented_with_structured_attributes() {
    let harness = harness();
    let field = field("South Field");
    harness.facade.save(&field).await.unwrap();

    let note = Observation::new("maria", "aphids clustering on the kale rows").attached_to(field.id);
    harness.facade.save(&note).await.unwrap();
    harness
        .facade
        .save(&observation("soil looks dry after the heatwave"))
        .await
        .unwrap();

    let hits = harness.facade.search("aphids", None).await.unwrap();

    assert_eq!(hits.len(), 1);
    let hit = &hits[0];
    assert_eq!(hit.entity_id, note.id);
    assert_eq!(hit.attributes["author"], json!("maria"));
    assert_eq!(hit.attributes["attached_to"], json!(field.id));

    let loaded: Observation = harness.facade.load(note.id).await.unwrap();
    assert_eq!(loaded.content, note.content);
}

#[tokio::test]
async fn search_honours_the_limit() {
    let harness = harness();
    for day in 0..4 {
        harness
            .facade
            .save(&observation(&format!("mildew spotted on day {day}")))
            .await
            .unwrap();
    }

    let hits = harness.facade.search("mildew", Some(2)).await.unwrap();
    assert_eq!(hits.len(), 2);
}

#[tokio::test]
async fn listing_pages_newest_first_with_cursors() {
    let harness = harness();
    let mut ids = Vec::new();
    for n in 0..12 {
        let plant = plant(&format!("Variety {n}"), "Solanaceae");
        ids.push(plant.id);
        harness.facade.save(&plant).await.unwrap();
    }
    harness
        .facade
        .save(&field("Not a plant"))
        .await
        .unwrap();

    let plant_type = Plant::entity_type();
    let first = harness.facade.list(&plant_type, 0).await.unwrap();
    assert_eq!(first.total, 12);
    assert_eq!(first.page_size, 5);
    assert_eq!(first.items.len(), 5);
    assert_eq!(first.prev_page, None);
    assert_eq!(first.next_page, Some(1));
    assert_eq!(first.items[0].entity_id, ids[11]);

    let last = harness.facade.list(&plant_type, 2).await.unwrap();
    assert_eq!(last.items.len(), 2);
    assert_eq!(last.prev_page, Some(1));
    assert_eq!(last.next_page, None);
    assert_eq!(last.items[1].entity_id, ids[0]);

    let mut seen = Vec::new();
    for page in 0..3 {
        let listed = harness.facade.list(&plant_type, page).await.unwrap();
        seen.extend(listed.items.iter().map(|view| view.entity_id));
    }
    seen.sort();
    ids.sort();
    assert_eq!(seen, ids);

    let beyond = harness.facade.list(&plant_type, 9).await.unwrap();
    assert!(beyond.items.is_empty());
    assert_eq!(beyond.next_page, None);
}

#[tokio::test]
async fn weather_samples_are_write_once() {
    let harness = harness();
    let field_id = EntityId::new();
    let sample = weather(field_id, 6);

    harness.facade.save(&sample).await.unwrap();
    let loaded: WeatherSample = harness.facade.load(sample.id).await.unwrap();
    assert_eq!(loaded, sample);

    let mut revised = sample.clone();
    revised.temperature_c = 40.0;
    let rewrite = harness.facade.save(&revised).await;
    assert!(matches!(rewrite, Err(FieldkitError::Validation(_))));

    let delete = harness.facade.delete(sample.id).await;
    assert!(matches!(delete, Err(FieldkitError::Validation(_))));

    let loaded: WeatherSample = harness.facade.load(sample.id).await.unwrap();
    assert_eq!(loaded.temperature_c, 18.5);
}

#[tokio::test]
async fn concurrent_saves_of_one_weather_sample_admit_exactly_one() {
    let harness = harness();
    harness
        .stores
        .timeseries
        .set_latency(std::time::Duration::from_millis(30));
    let first = weather(EntityId::new(), 9);
    let mut second = first.clone();
    second.temperature_c = 99.0;

    let (a, b) = tokio::join!(harness.facade.save(&first), harness.facade.save(&second));
    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, FieldkitError::Validation(_))));

    let stored: WeatherSample = harness.facade.load(first.id).await.unwrap();
    let winner = if outcomes[0].is_ok() { &first } else { &second };
    assert_eq!(stored.temperature_c, winner.temperature_c);
}

#[tokio::test]
async fn write_cannot_change_the_type_of_an_existing_entity() {
    let harness = harness();
    let field = field("East Field");
    harness.facade.save(&field).await.unwrap();

    let result = harness
        .facade
        .write(
            &Plant::entity_type(),
            field.id,
            json!({ "name": "Kale", "family": "Brassicaceae" })
                .as_object()
                .cloned()
                .unwrap(),
        )
        .await;
    assert!(matches!(
        result,
        Err(FieldkitError::Validation(ref msg)) if msg.contains("already exists as field")
    ));

    let loaded: Field = harness.facade.load(field.id).await.unwrap();
    assert_eq!(loaded, field);
}

#[tokio::test]
async fn type_of_a_pending_entity_is_also_protected() {
    let harness = harness();
    harness.stores.structured.set_mode(FaultMode::Failing);
    harness.stores.search.set_mode(FaultMode::Failing);
    let field = field("West Field");
    let receipt = harness.facade.save(&field).await.unwrap();
    assert_eq!(receipt.status, IntentStatus::Pending);
    assert!(receipt.acknowledged.is_empty());

    let result = harness
        .facade
        .write(
            &Plant::entity_type(),
            field.id,
            json!({ "name": "Kale" }).as_object().cloned().unwrap(),
        )
        .await;
    assert!(matches!(result, Err(FieldkitError::Validation(_))));

    harness.stores.heal_all();
    harness.reconciler.reconcile_all().await.unwrap();
    let loaded: Field = harness.facade.load(field.id).await.unwrap();
    assert_eq!(loaded, field);
}

#[tokio::test]
async fn immutable_write_refuses_when_existence_is_unknown() {
    let harness = harness();
    harness.stores.timeseries.set_mode(FaultMode::Failing);

    let result = harness.facade.save(&weather(EntityId::new(), 7)).await;
    assert!(matches!(result, Err(FieldkitError::IncompleteRead { .. })));
}

#[tokio::test]
async fn delete_removes_the_entity_from_every_store() {
    let harness = harness();
    let field = field("Old Field");
    harness.facade.save(&field).await.unwrap();

    let receipt = harness.facade.delete(field.id).await.unwrap();
    assert_eq!(receipt.status, IntentStatus::Complete);

    let view = harness.facade.read(field.id).await.unwrap();
    assert!(!view.is_found());
    assert!(harness.facade.search("drains", None).await.unwrap().is_empty());

    let again = harness.facade.delete(field.id).await;
    assert!(matches!(again, Err(FieldkitError::NotFound(_))));
}

#[tokio::test]
async fn routes_are_described_for_operators() {
    let harness = harness();
    let routes = harness.facade.describe_routes();

    assert!(routes.iter().any(|route| route.entity_type == "document"
        && route.category == StoreCategory::Blob
        && route.attributes == vec!["content".to_string()]));
}
