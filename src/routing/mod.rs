//! # Store Routing
//!
//! Deterministic mapping from entity attributes to store adapters, and the
//! timeout-bounded handles through which every store call is made.

pub mod errors;
pub mod handle;
pub mod store_router;

pub use errors::{RoutingError, RoutingResult};
pub use handle::StoreHandle;
pub use store_router::{RouteDescription, StoreRouter, StoreRouterBuilder, SubWrite};
