//! Configuration layering tests: defaults, files and environment overrides.
//!
//! Everything that touches process environment lives in one test so the
//! variables cannot leak into parallel cases.

use fieldkit_core::config::{ConfigManager, FieldkitConfig, IntentLogBackend};
use fieldkit_core::stores::StoreCategory;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn defaults_are_valid_and_conservative() {
    let config = FieldkitConfig::default();

    config.validate().unwrap();
    assert_eq!(config.consistency.intent_log.backend, IntentLogBackend::Memory);
    assert!(config.consistency.reconciler_enabled);
    assert_eq!(config.consistency.max_attempts, 6);
    assert_eq!(config.rotation.restriction_window_days, 0);
    assert_eq!(config.query.page_size, 5);
    assert_eq!(
        config.stores.timeout_for(StoreCategory::Blob),
        Duration::from_millis(2_000)
    );
}

#[test]
fn files_then_environment_variables_override_defaults() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("fieldkit.yaml"),
        "stores:\n  default_timeout_ms: 1500\n  timeouts_ms:\n    blob: 5000\nconsistency:\n  max_attempts: 4\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("fieldkit.staging.yaml"),
        "rotation:\n  restriction_window_days: 730\nconsistency:\n  intent_log:\n    backend: file\n    path: /var/lib/fieldkit/intents.jsonl\n",
    )
    .unwrap();

    std::env::set_var("FIELDKIT__CONSISTENCY__MAX_ATTEMPTS", "9");
    std::env::set_var("FIELDKIT__QUERY__PAGE_SIZE", "25");
    let loaded = ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "staging");
    std::env::remove_var("FIELDKIT__CONSISTENCY__MAX_ATTEMPTS");
    std::env::remove_var("FIELDKIT__QUERY__PAGE_SIZE");

    let manager = loaded.unwrap();
    let config = manager.config();
    assert_eq!(manager.environment(), "staging");
    assert_eq!(config.stores.default_timeout_ms, 1_500);
    assert_eq!(
        config.stores.timeout_for(StoreCategory::Blob),
        Duration::from_millis(5_000)
    );
    assert_eq!(
        config.stores.timeout_for(StoreCategory::Search),
        Duration::from_millis(1_500)
    );
    assert_eq!(config.rotation.restriction_window_days, 730);
    assert_eq!(config.consistency.intent_log.backend, IntentLogBackend::File);
    assert_eq!(config.consistency.max_attempts, 9);
    assert_eq!(config.query.page_size, 25);
}

#[test]
fn file_backend_without_a_path_is_rejected() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("fieldkit.yaml"),
        "consistency:\n  intent_log:\n    backend: file\n",
    )
    .unwrap();

    let result = ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test");
    assert!(result.is_err());
}
