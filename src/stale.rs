//! # Generation counter used to reject stale results.
//!
//! Every unit of asynchronous work captures an [`Epoch`] when it starts. When it
//! finishes, the result may be applied only if the epoch is still
//! [current](Generation::is_current). Anything that supersedes the work
//! (a new attempt, a dependency change, disposal) calls [`Generation::bump`].
//!
//! ```text
//! begin() ─► Epoch(4) ──────────────── resolves ──► is_current(4)? no  → discard
//!               bump() ─► Epoch(5) ─ resolves ──► is_current(5)? yes → apply
//! ```
//!
//! ## Rules
//! - The counter is **monotonic** and never reused.
//! - The comparison is exact; completion order is irrelevant.

use std::sync::atomic::{AtomicU64, Ordering};

/// Value of a [`Generation`] captured at the start of a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch(u64);

impl Epoch {
    /// Raw counter value (for events and logs).
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Monotonic counter identifying the current epoch of an engine.
#[derive(Debug, Default)]
pub struct Generation {
    current: AtomicU64,
}

impl Generation {
    /// Creates a counter at epoch 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the epoch currently in effect.
    #[inline]
    pub fn current(&self) -> Epoch {
        Epoch(self.current.load(Ordering::Acquire))
    }

    /// Invalidates every previously captured epoch and returns the new one.
    #[inline]
    pub fn bump(&self) -> Epoch {
        Epoch(self.current.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// True if `epoch` has not been superseded.
    #[inline]
    pub fn is_current(&self, epoch: Epoch) -> bool {
        self.current() == epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bump_invalidates_captured_epochs() {
        let generation = Generation::new();
        let first = generation.bump();
        assert!(generation.is_current(first));

        let second = generation.bump();
        assert!(!generation.is_current(first));
        assert!(generation.is_current(second));
        assert!(second > first);
    }

    #[test]
    fn starts_at_zero() {
        let generation = Generation::new();
        assert_eq!(generation.current().get(), 0);
    }
}
