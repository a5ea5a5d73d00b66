//! # Domain Model Registry
//!
//! Defines which attributes of each entity type live in which store category.
//!
//! ```text
//! register(entity_type, schema) ──► DecompositionPlan
//!                                    ├── structured: [name, boundary, soil]
//!                                    ├── search:     [notes]
//!                                    └── ...
//! ```

pub mod domain_registry;
pub mod errors;
pub mod schema;

pub use domain_registry::DomainModelRegistry;
pub use errors::{SchemaError, SchemaResult};
pub use schema::{AttributeSpec, DecompositionPlan, EntitySchema, EntitySchemaBuilder};
