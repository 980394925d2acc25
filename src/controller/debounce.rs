//! Clock-driven debouncing.
//!
//! The controller never spawns timers: callers pass the current instant to
//! every call, which keeps reconciliation on the calling thread and makes
//! timing fully reproducible in tests.

use std::time::{Duration, Instant};

/// Keeps the latest value until `window` passes without a newer one.
#[derive(Debug)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<(Instant, T)>,
}

impl<T> Debouncer<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    /// Record a value, restarting the quiet window.
    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((now + self.window, value));
    }

    /// The pending value, once its quiet window has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let due = matches!(&self.pending, Some((deadline, _)) if now >= *deadline);
        if due {
            self.pending.take().map(|(_, value)| value)
        } else {
            None
        }
    }

    /// Drop any pending value.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(deadline, _)| *deadline)
    }
}
