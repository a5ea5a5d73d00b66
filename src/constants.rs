//! # System Constants
//!
//! Entity type names, reserved attribute names and operational defaults shared
//! across the registry, router and consistency layers.

/// Canonical entity type names for the farm domain
pub mod entity_types {
    pub const FIELD: &str = "field";
    pub const PLOT: &str = "plot";
    pub const PLANTING_EVENT: &str = "planting_event";
    pub const PLANT: &str = "plant";
    pub const OBSERVATION: &str = "observation";
    pub const DOCUMENT: &str = "document";
    pub const WEATHER_SAMPLE: &str = "weather_sample";

    /// All built-in entity types, in registration order
    pub const ALL: [&str; 7] = [
        FIELD,
        PLOT,
        PLANTING_EVENT,
        PLANT,
        OBSERVATION,
        DOCUMENT,
        WEATHER_SAMPLE,
    ];
}

/// Attribute names that carry meaning outside a single entity schema
pub mod attributes {
    /// Identifier attribute, never stored as a regular attribute
    pub const ID: &str = "id";
    pub const FIELD_ID: &str = "field_id";
    pub const PLANT_FAMILY: &str = "plant_family";
    pub const START_DATE: &str = "start_date";
    pub const END_DATE: &str = "end_date";
    /// Timestamp attribute indexed by the time-series store
    pub const RECORDED_AT: &str = "recorded_at";
}

/// Intent lifecycle events, used as structured log `operation` values
pub mod events {
    pub const INTENT_RECORDED: &str = "intent.recorded";
    pub const INTENT_APPLIED: &str = "intent.applied";
    pub const INTENT_PENDING: &str = "intent.pending";
    pub const INTENT_COMPLETED: &str = "intent.completed";
    pub const INTENT_FAILED: &str = "intent.failed";
    pub const INTENT_REQUEUED: &str = "intent.requeued";
    pub const INTENT_QUEUED: &str = "intent.queued";
}

/// System-wide defaults
pub mod system {
    pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 2_000;
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 6;
    pub const DEFAULT_RECONCILER_POLL_INTERVAL_MS: u64 = 1_000;
    pub const DEFAULT_COMPLETED_RETENTION_MS: u64 = 300_000;
    pub const DEFAULT_BACKOFF_BASE_MS: u64 = 500;
    pub const DEFAULT_BACKOFF_MAX_MS: u64 = 60_000;
    pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
    pub const DEFAULT_ROTATION_WINDOW_DAYS: i64 = 0;
    pub const DEFAULT_PAGE_SIZE: usize = 5;
    pub const DEFAULT_SEARCH_LIMIT: usize = 20;
    pub const DEFAULT_MAX_BLOB_BYTES: usize = 16 * 1024 * 1024;
    pub const ENV_PREFIX: &str = "FIELDKIT";
}
