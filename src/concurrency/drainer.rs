//! Counted keep-alive tokens for long-running tasks

use std::sync::{Arc, Condvar, Mutex};

use super::signal::Signal;

#[derive(Debug)]
struct DrainerInner {
    outstanding: Mutex<usize>,
    all_released: Condvar,
    drain_signal: Signal,
}

/// A counted lifetime gate owned by a store.
///
/// Tasks that must keep the store alive hold a [`DrainLock`]. Draining
/// pulses the drain signal, then blocks until every lock is dropped; once
/// draining has begun no new lock can be taken.
#[derive(Debug, Clone)]
pub struct Drainer {
    inner: Arc<DrainerInner>,
}

impl Default for Drainer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drainer {
    pub fn new() -> Self {
        Drainer {
            inner: Arc::new(DrainerInner {
                outstanding: Mutex::new(0),
                all_released: Condvar::new(),
                drain_signal: Signal::new(),
            }),
        }
    }

    /// Takes a keep-alive lock, or `None` once draining has begun.
    pub fn lock(&self) -> Option<DrainLock> {
        let mut count = self
            .inner
            .outstanding
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if self.inner.drain_signal.is_pulsed() {
            return None;
        }
        *count += 1;
        Some(DrainLock {
            inner: Arc::clone(&self.inner),
        })
    }

    /// The signal pulsed when draining begins. Tasks holding a lock
    /// observe it and unwind within a bounded number of yields.
    pub fn drain_signal(&self) -> &Signal {
        &self.inner.drain_signal
    }

    /// Begins draining and blocks until all outstanding locks drop.
    pub fn drain(&self) {
        self.inner.drain_signal.pulse();
        let mut count = self
            .inner
            .outstanding
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        while *count > 0 {
            count = self
                .inner
                .all_released
                .wait(count)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Number of locks currently held.
    pub fn outstanding(&self) -> usize {
        *self
            .inner
            .outstanding
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

/// A held keep-alive token. Cloning takes another count; dropping the
/// last count unblocks a pending `drain`.
#[derive(Debug)]
pub struct DrainLock {
    inner: Arc<DrainerInner>,
}

impl DrainLock {
    /// The drain signal of the parent drainer.
    pub fn drain_signal(&self) -> &Signal {
        &self.inner.drain_signal
    }
}

impl Clone for DrainLock {
    fn clone(&self) -> Self {
        let mut count = self
            .inner
            .outstanding
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *count += 1;
        DrainLock {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Drop for DrainLock {
    fn drop(&mut self) {
        let mut count = self
            .inner
            .outstanding
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *count -= 1;
        if *count == 0 {
            self.inner.all_released.notify_all();
        }
    }
}
