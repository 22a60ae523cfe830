//! Online secondary-index post-construction
//!
//! Building an index over data that is already on disk while the table
//! keeps taking writes. The hard part is losing nothing: a disk-backed
//! modification queue is registered before the primary scan begins, so
//! every committed write reaches the new index through the scan, the
//! queue, or (harmlessly) both.
//!
//! # Correctness
//!
//! Every primary-key mutation is applied to the new index at least once.
//! Index updates are idempotent, so at-least-once is sufficient; writes
//! landing during the scan are counted twice without damage.

mod engine;
mod errors;
mod queue;
mod report;

pub use engine::{
    post_construct_and_drain_queue, spawn_post_construction, PostConstructionState, MAX_CHUNK,
};
pub use errors::{QueueError, QueueErrorCode, QueueResult, Severity as QueueSeverity};
pub use queue::{ModQueue, SharedModQueue};
pub use report::ModReport;
