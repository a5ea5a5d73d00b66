//! # Consistency Coordinator
//!
//! Cross-store writes without a distributed transaction: a durable intent log,
//! idempotent stamped store writes, per-entity ordering and a background
//! reconciler with bounded exponential backoff.
//!
//! Consistency is eventual. Between the first and last acknowledgement of an
//! intent a reader may see the write in some stores and not in others.

pub mod backoff;
pub mod coordinator;
pub mod errors;
pub mod intent;
pub mod intent_log;
pub mod reconciler;

pub use backoff::BackoffPolicy;
pub use coordinator::{ConsistencyCoordinator, ExhaustedIntent, WriteReceipt};
pub use errors::{IntentLogError, IntentLogResult};
pub use intent::{IntentOperation, IntentRecord, IntentStatus, TargetWrite};
#[cfg(feature = "postgres")]
pub use intent_log::PgIntentLog;
pub use intent_log::{FileIntentLog, IntentLog, MemoryIntentLog};
pub use reconciler::{ReconcileReport, Reconciler, ReconcilerHandle};
