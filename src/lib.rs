#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, JSONB in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Fieldkit Core
//!
//! Unified multi-model data-access layer for farm management.
//!
//! ## Overview
//!
//! Farm data is heterogeneous: field boundaries and soil profiles are
//! relational, notes need full-text search, weather samples are time-series
//! and photos are binary blobs. Fieldkit stores each attribute group in the
//! store that fits it and gives callers one interface over all of them.
//!
//! ## Architecture
//!
//! ```text
//! caller ──► UnifiedQueryFacade ──► StoreRouter ──► structured | search | timeseries | blob
//!                 │                     ▲
//!                 ▼                     │
//!       ConsistencyCoordinator ── IntentLog ◄── Reconciler (background)
//! ```
//!
//! - The [`registry`] decides which attributes of an entity type live in which
//!   store category.
//! - The [`routing`] layer maps attributes to store adapters and bounds every
//!   store call with a timeout.
//! - The [`facade`] merges reads across stores and validates writes.
//! - The [`consistency`] layer records every write as an intent before touching
//!   any store, applies it idempotently and retries it in the background.
//!
//! ## Consistency Model
//!
//! Consistency is **eventual**. A write spanning several stores becomes visible
//! store by store; readers may observe some attribute groups updated and others
//! not yet. Writes to one entity are applied in submission order; writes to
//! different entities run in parallel.
//!
//! ## Module Organization
//!
//! - [`models`] - Farm entities, identifiers and store record shapes
//! - [`registry`] - Domain model registry and decomposition plans
//! - [`stores`] - Store adapter contract and in-memory adapters
//! - [`routing`] - Store router and timeout-bounded store handles
//! - [`facade`] - Unified query facade
//! - [`consistency`] - Intent log, coordinator and reconciler
//! - [`guards`] - Cross-entity write invariants (crop rotation)
//! - [`api`] - Transport-independent request/response service
//! - [`config`] - Layered configuration
//! - [`bootstrap`] - System wiring and lifecycle
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fieldkit_core::bootstrap::FieldkitSystem;
//! use fieldkit_core::config::{ConfigManager, FieldkitConfig};
//! use fieldkit_core::models::{DomainEntity, Plant};
//!
//! # async fn example() -> fieldkit_core::FieldkitResult<()> {
//! let manager = ConfigManager::from_config(FieldkitConfig::default(), "development")?;
//! let mut system = FieldkitSystem::bootstrap(manager).await?;
//!
//! let tomato = Plant::new("Tomato", "Solanaceae").with_description("indeterminate vine");
//! system.facade().save(&tomato).await?.into_result()?;
//!
//! let hits = system.facade().search("vine", None).await?;
//! assert_eq!(hits[0].entity_id, tomato.id());
//!
//! system.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod consistency;
pub mod constants;
pub mod error;
pub mod facade;
pub mod guards;
pub mod logging;
pub mod models;
pub mod registry;
pub mod routing;
pub mod stores;
pub mod test_helpers;

pub use api::{DataRequest, DataResponse, DataService};
pub use bootstrap::FieldkitSystem;
pub use config::{ConfigManager, FieldkitConfig};
pub use consistency::{
    ConsistencyCoordinator, IntentLog, IntentRecord, IntentStatus, Reconciler, WriteReceipt,
};
pub use error::{FieldkitError, FieldkitResult, Result};
pub use facade::{EntityView, Page, UnifiedQueryFacade};
pub use models::{Attributes, DomainEntity, EntityId, EntityType, IntentId};
pub use registry::{DecompositionPlan, DomainModelRegistry, EntitySchema};
pub use routing::StoreRouter;
pub use stores::{StoreAdapter, StoreCategory};
