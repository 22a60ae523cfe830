//! Concurrency primitives for the cooperative store runtime
//!
//! One scheduler runs per CPU shard; work units suspend only at explicit
//! yield points and at I/O. The primitives here are the small set the
//! routing core and the post-construction engine rely on: pulse-once
//! signals, counted drain tokens, and FIFO in-line lock queues.

mod drainer;
mod inline;
mod signal;

pub use drainer::{DrainLock, Drainer};
pub use inline::{Access, InlineHandle, InlineQueue};
pub use signal::Signal;

/// Hands control to the scheduler without releasing held locks.
///
/// Loops that process bounded batches call this at least once per
/// iteration to preserve scheduler fairness.
pub fn yield_now() {
    std::thread::yield_now();
}
