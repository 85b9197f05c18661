//! The two-flag connection lifecycle state machine.
//!
//! Two atomics, not one combined enum: the only race is the `(false, true)
//! -> (true, false)` promotion inside `connect_with_retry`, which is
//! single-writer. A third flag marks the terminal, post-`shutdown` state,
//! since that transition is one-way and distinct from "currently
//! disconnected."

use std::sync::atomic::{AtomicBool, Ordering};

/// The lifecycle flags for one table instance.
#[derive(Debug, Default)]
pub struct Lifecycle {
    connected: AtomicBool,
    trying_to_connect: AtomicBool,
    shut_down: AtomicBool,
}

/// A snapshot of the two legally-combined flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleState {
    pub connected: bool,
    pub trying_to_connect: bool,
}

impl Lifecycle {
    pub fn snapshot(&self) -> LifecycleState {
        LifecycleState {
            connected: self.connected.load(Ordering::SeqCst),
            trying_to_connect: self.trying_to_connect.load(Ordering::SeqCst),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn is_trying_to_connect(&self) -> bool {
        self.trying_to_connect.load(Ordering::SeqCst)
    }

    pub fn set_connected(&self, value: bool) {
        self.connected.store(value, Ordering::SeqCst);
    }

    pub fn set_trying_to_connect(&self, value: bool) {
        self.trying_to_connect.store(value, Ordering::SeqCst);
    }

    /// Marks the table shut down. Returns `true` if this call performed the
    /// transition, `false` if the table was already shut down (the caller
    /// uses this to make `shutdown()` idempotent).
    pub fn mark_shut_down(&self) -> bool {
        !self.shut_down.swap(true, Ordering::SeqCst)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_both_false() {
        let lc = Lifecycle::default();
        let s = lc.snapshot();
        assert!(!s.connected);
        assert!(!s.trying_to_connect);
    }

    #[test]
    fn mark_shut_down_is_idempotent() {
        let lc = Lifecycle::default();
        assert!(lc.mark_shut_down());
        assert!(!lc.mark_shut_down());
        assert!(lc.is_shut_down());
    }
}
