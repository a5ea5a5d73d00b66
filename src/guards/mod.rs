//! # Write Guards
//!
//! Cross-entity invariants checked by the facade before a write is submitted.
//! A guard sees the proposed state of the entity (current attributes merged
//! with the partial write) and may query stores through the router. Stores lag
//! behind PENDING intents, so guards also get the intent log to account for
//! writes that are accepted but not yet applied everywhere.

pub mod errors;
pub mod rotation;

pub use errors::{GuardError, GuardResult};
pub use rotation::{spans_conflict, DateSpan, RotationGuard};

use crate::consistency::IntentLog;
use crate::models::{Attributes, EntityId, EntityType};
use crate::routing::StoreRouter;
use async_trait::async_trait;
use std::fmt;

/// What a guard is asked to judge
#[derive(Debug)]
pub struct GuardContext<'a> {
    pub entity_type: &'a EntityType,
    pub entity_id: EntityId,
    /// Entity state if the write is accepted
    pub proposed: &'a Attributes,
    pub router: &'a StoreRouter,
    pub intent_log: &'a dyn IntentLog,
}

#[async_trait]
pub trait WriteGuard: Send + Sync + fmt::Debug {
    fn applies_to(&self, entity_type: &EntityType) -> bool;

    /// Writes sharing a key are checked and submitted one at a time, so two
    /// concurrent writes cannot both pass a check the other would fail
    fn serialization_key(&self, _context: &GuardContext<'_>) -> Option<String> {
        None
    }

    async fn check(&self, context: &GuardContext<'_>) -> GuardResult<()>;

    /// Get a description of this guard for logging
    fn description(&self) -> &'static str;
}
