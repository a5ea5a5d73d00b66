//! # Store Adapters
//!
//! Store categories, the adapter contract and the in-memory reference adapters
//! for the structured, search, time-series and blob stores.

pub mod adapter;
pub mod category;
pub mod errors;
pub mod filter;
pub mod memory;

pub use adapter::{PutOutcome, StoreAdapter};
pub use category::StoreCategory;
pub use errors::{StoreError, StoreResult};
pub use filter::StoreFilter;
pub use memory::{MemoryBlobStore, MemorySearchStore, MemoryStructuredStore, MemoryTimeSeriesStore};
