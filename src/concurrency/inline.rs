//! In-line FIFO lock acquisition
//!
//! Acquisition enqueues and returns a handle immediately; the handle's
//! ready signal fires when it reaches the head of the queue. Dropping a
//! handle leaves the queue, whether or not it ever became ready.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::signal::Signal;

/// Access mode for read/write in-line queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

#[derive(Debug)]
struct Entry {
    ticket: u64,
    access: Access,
    ready: Arc<Signal>,
}

#[derive(Debug, Default)]
struct QueueState {
    next_ticket: u64,
    entries: VecDeque<Entry>,
}

impl QueueState {
    /// Pulses the ready signals of every entry allowed to hold the lock:
    /// the head, plus any contiguous run of readers starting at the head.
    fn grant(&mut self) {
        let mut granting_readers = false;
        for (i, entry) in self.entries.iter().enumerate() {
            match entry.access {
                Access::Write => {
                    if i == 0 {
                        entry.ready.pulse();
                    }
                    break;
                }
                Access::Read => {
                    if i == 0 {
                        granting_readers = true;
                    }
                    if granting_readers {
                        entry.ready.pulse();
                    } else {
                        break;
                    }
                }
            }
        }
    }
}

/// A FIFO in-line lock queue.
///
/// The plain mutex form enqueues everything as a writer; the rwlock form
/// lets contiguous readers share the head.
#[derive(Debug, Clone, Default)]
pub struct InlineQueue {
    state: Arc<Mutex<QueueState>>,
}

impl InlineQueue {
    pub fn new() -> Self {
        InlineQueue::default()
    }

    /// Enqueues an exclusive acquisition and returns its handle
    /// immediately. Equivalent to `enqueue_access(Access::Write)`.
    pub fn enqueue(&self) -> InlineHandle {
        self.enqueue_access(Access::Write)
    }

    /// Enqueues an acquisition with the given access mode.
    pub fn enqueue_access(&self, access: Access) -> InlineHandle {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let ticket = state.next_ticket;
        state.next_ticket += 1;
        let ready = Arc::new(Signal::new());
        state.entries.push_back(Entry {
            ticket,
            access,
            ready: Arc::clone(&ready),
        });
        state.grant();
        InlineHandle {
            ticket,
            ready,
            state: Arc::clone(&self.state),
        }
    }

    /// Number of acquisitions currently in line.
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A position in an in-line queue.
///
/// `ready()` fires when this handle holds the lock. Dropping the handle
/// releases its position and advances the queue.
#[derive(Debug)]
pub struct InlineHandle {
    ticket: u64,
    ready: Arc<Signal>,
    state: Arc<Mutex<QueueState>>,
}

impl InlineHandle {
    /// The signal pulsed when this acquisition reaches the head.
    pub fn ready(&self) -> &Signal {
        &self.ready
    }
}

impl Drop for InlineHandle {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pos) = state.entries.iter().position(|e| e.ticket == self.ticket) {
            state.entries.remove(pos);
            state.grant();
        }
    }
}
