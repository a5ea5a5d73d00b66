//! # Unified Query Facade
//!
//! Store-transparent reads, writes, search and listings over the farm domain.

pub mod query_facade;
pub mod view;

pub use query_facade::UnifiedQueryFacade;
pub use view::{EntityView, Page};
