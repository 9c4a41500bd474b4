//! Minimum-interval gate for revalidation calls.
//!
//! Focus, visibility and timer triggers often fire together. The gate lets
//! the first through and rejects the rest until `min_interval` has passed,
//! whatever their source.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct RevalidationGate {
    min_interval: Duration,
    last: Option<Instant>,
}

impl RevalidationGate {
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self { min_interval, last: None }
    }

    pub fn try_acquire(&mut self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    /// Internal: acquire with an explicit timestamp (for testing).
    pub(crate) fn try_acquire_at(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last {
            if now.saturating_duration_since(last) < self.min_interval {
                return false;
            }
        }
        self.last = Some(now);
        true
    }

    /// Forget the last call so the next trigger passes immediately.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
#[path = "gate_test.rs"]
mod tests;
