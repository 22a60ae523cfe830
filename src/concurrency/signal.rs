//! Pulse-once broadcast signals

use std::sync::{Condvar, Mutex};

/// A one-shot broadcast signal.
///
/// Starts unpulsed; `pulse` is idempotent and wakes every current and
/// future waiter. Used for drain notification, in-line lock readiness,
/// and unshard interruption.
#[derive(Debug, Default)]
pub struct Signal {
    pulsed: Mutex<bool>,
    cond: Condvar,
}

impl Signal {
    pub fn new() -> Self {
        Signal::default()
    }

    /// Fires the signal. Idempotent.
    pub fn pulse(&self) {
        let mut pulsed = self.pulsed.lock().unwrap_or_else(|e| e.into_inner());
        *pulsed = true;
        self.cond.notify_all();
    }

    /// Whether the signal has fired.
    pub fn is_pulsed(&self) -> bool {
        *self.pulsed.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Blocks until the signal fires. Returns immediately if it already
    /// has.
    pub fn wait(&self) {
        let mut pulsed = self.pulsed.lock().unwrap_or_else(|e| e.into_inner());
        while !*pulsed {
            pulsed = self
                .cond
                .wait(pulsed)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Blocks until either this signal or `interruptor` fires.
    ///
    /// Returns `true` if this signal fired, `false` if the wait was cut
    /// short by the interruptor. Polls in short slices because the two
    /// signals do not share a condvar.
    pub fn wait_interruptible(&self, interruptor: &Signal) -> bool {
        use std::time::Duration;

        let mut pulsed = self.pulsed.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if *pulsed {
                return true;
            }
            if interruptor.is_pulsed() {
                return false;
            }
            let (guard, _timeout) = self
                .cond
                .wait_timeout(pulsed, Duration::from_millis(10))
                .unwrap_or_else(|e| e.into_inner());
            pulsed = guard;
        }
    }
}
