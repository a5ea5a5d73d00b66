//! # Test Helpers
//!
//! Fault injection and pre-wired in-memory systems for unit and integration
//! tests.

pub mod flaky_store;
pub mod harness;

pub use flaky_store::{FaultMode, FlakyStore};
pub use harness::{test_config, FlakyStores, TestHarness};
