//! Bounded exponential backoff for the reconnect path.
//!
//! One [`BackoffCounter`] lives per table instance and is single-writer:
//! only the reconnect path touches it. It doubles the delay on each
//! [`BackoffCounter::increment`] starting from `floor`, clamps at `ceiling`,
//! and snaps back to `floor` on [`BackoffCounter::reset`].

use std::time::Duration;

const DEFAULT_FLOOR: Duration = Duration::from_secs(1);
const DEFAULT_CEILING: Duration = Duration::from_secs(60);

/// A stateful accumulator producing the next retry delay in a bounded
/// doubling sequence: 1, 2, 4, 8, 16, 32, 60, 60, ... (seconds, with the
/// default floor/ceiling).
#[derive(Debug, Clone)]
pub struct BackoffCounter {
    floor: Duration,
    ceiling: Duration,
    current: Duration,
}

impl Default for BackoffCounter {
    fn default() -> Self {
        Self::new(DEFAULT_FLOOR, DEFAULT_CEILING)
    }
}

impl BackoffCounter {
    /// Builds a counter starting at `floor`, whose delay never exceeds
    /// `ceiling`.
    ///
    /// # Panics
    ///
    /// Panics if `floor` is zero or `floor > ceiling` (both indicate a
    /// misconfigured backend, not a runtime condition).
    pub fn new(floor: Duration, ceiling: Duration) -> Self {
        assert!(!floor.is_zero(), "backoff floor must be non-zero");
        assert!(floor <= ceiling, "backoff floor must not exceed ceiling");
        Self {
            floor,
            ceiling,
            current: floor,
        }
    }

    /// The current delay, plus a short human-readable rendering of it
    /// ("1 sec", "2 sec", ..., "1 min").
    pub fn current(&self) -> (Duration, String) {
        (self.current, render(self.current))
    }

    /// Doubles the delay, clamped at the ceiling. Idempotent once the
    /// ceiling has been reached.
    pub fn increment(&mut self) {
        self.current = self.current.saturating_mul(2).min(self.ceiling);
    }

    /// Returns the delay to the floor.
    pub fn reset(&mut self) {
        self.current = self.floor;
    }
}

fn render(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        let mins = secs / 60;
        format!("{mins} min")
    } else {
        format!("{secs} sec")
    }
}
