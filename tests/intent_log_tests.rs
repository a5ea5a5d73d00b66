//! Durable intent log tests: pending intents survive a restart and are
//! reconciled against the same stores.

mod common;

use common::*;
use fieldkit_core::consistency::{FileIntentLog, IntentLog, IntentStatus};
use fieldkit_core::models::{EntityId, Plant};
use fieldkit_core::stores::StoreCategory;
use fieldkit_core::test_helpers::{test_config, FaultMode, FlakyStores, TestHarness};
use std::sync::Arc;
use tempfile::TempDir;

async fn open_log(dir: &TempDir) -> Arc<dyn IntentLog> {
    Arc::new(
        FileIntentLog::open(dir.path().join("intents.jsonl"), true)
            .await
            .unwrap(),
    )
}

#[tokio::test]
async fn pending_intents_survive_a_restart() {
    let dir = TempDir::new().unwrap();
    let config = test_config();
    let stores = FlakyStores::new(config.stores.max_blob_bytes);
    let plant = plant("Garlic", "Amaryllidaceae");

    let receipt = {
        let before = TestHarness::with_stores(config.clone(), stores.clone(), open_log(&dir).await)
            .unwrap();
        stores.search.set_mode(FaultMode::Failing);
        let receipt = before.facade.save(&plant).await.unwrap();
        assert_eq!(receipt.status, IntentStatus::Pending);
        receipt
    };

    stores.heal_all();
    let after = TestHarness::with_stores(config, stores.clone(), open_log(&dir).await).unwrap();

    let pending = after.coordinator.pending_intents().await.unwrap();
    assert_eq!(pending.len(), 1);
    let recovered = &pending[0];
    assert_eq!(recovered.intent_id, receipt.intent_id);
    assert_eq!(recovered.entity_id, plant.id);
    assert_eq!(recovered.pending_stores(), vec![StoreCategory::Search]);
    assert_eq!(recovered.acknowledged_stores(), vec![StoreCategory::Structured]);

    let report = after.reconciler.reconcile_all().await.unwrap();
    assert_eq!(report.completed, 1);

    let loaded: Plant = after.facade.load(plant.id).await.unwrap();
    assert_eq!(loaded, plant);
    assert_eq!(stores.structured.applied_puts_for(plant.id).len(), 1);
}

#[tokio::test]
async fn sequences_keep_increasing_across_restarts() {
    let dir = TempDir::new().unwrap();
    let config = test_config();
    let stores = FlakyStores::new(config.stores.max_blob_bytes);

    let first = {
        let harness =
            TestHarness::with_stores(config.clone(), stores.clone(), open_log(&dir).await).unwrap();
        harness.facade.save(&plant("Pea", "Fabaceae")).await.unwrap()
    };

    let harness = TestHarness::with_stores(config, stores, open_log(&dir).await).unwrap();
    let second = harness.facade.save(&plant("Bean", "Fabaceae")).await.unwrap();

    assert!(second.sequence > first.sequence);
    let stored = harness
        .coordinator
        .intent(first.intent_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, IntentStatus::Complete);
}

#[tokio::test]
async fn restart_preserves_per_entity_order() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config();
    config.consistency.max_attempts = 10;
    let stores = FlakyStores::new(config.stores.max_blob_bytes);
    let plant_id = EntityId::new();

    {
        let harness =
            TestHarness::with_stores(config.clone(), stores.clone(), open_log(&dir).await).unwrap();
        let mut plant = Plant::new("first", "Poaceae").with_description("first sowing");
        plant.id = plant_id;
        harness.facade.save(&plant).await.unwrap();

        stores.search.set_mode(FaultMode::Failing);
        plant.name = "second".to_string();
        plant.description = "second sowing".to_string();
        harness.facade.save(&plant).await.unwrap();
        plant.name = "third".to_string();
        plant.description = "third sowing".to_string();
        let queued = harness.facade.save(&plant).await.unwrap();
        assert_eq!(queued.attempts, 0);
    }

    stores.heal_all();
    let harness = TestHarness::with_stores(config, stores.clone(), open_log(&dir).await).unwrap();
    assert_eq!(harness.coordinator.pending_intents().await.unwrap().len(), 2);
    harness.reconciler.reconcile_all().await.unwrap();

    let loaded: Plant = harness.facade.load(plant_id).await.unwrap();
    assert_eq!(loaded.name, "third");
    assert_eq!(loaded.description, "third sowing");
}
