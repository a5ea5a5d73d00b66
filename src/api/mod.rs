//! # Data Service API
//!
//! Transport-independent request/response surface over the facade. An HTTP,
//! message-queue or CLI front end only has to move [`DataRequest`] and
//! [`DataResponse`] values (or their JSON form) across the wire.

pub mod service;

pub use service::{DataRequest, DataResponse, DataService};
