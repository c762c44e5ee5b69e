//! Pluggable delay generation for arrival and processing intervals.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rand::Rng;
use serde::Serialize;

/// Inclusive millisecond range a delay is drawn from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn millis(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    #[cfg(test)]
    pub const fn fixed(ms: u64) -> Self {
        Self::millis(ms, ms)
    }

    pub fn is_inverted(&self) -> bool {
        self.min_ms > self.max_ms
    }
}

/// Source of randomness for the actors; tests swap in [`FixedDelays`].
pub trait DelaySource: Send + Sync {
    /// Duration to sleep, somewhere inside `range`.
    fn delay(&self, range: &DelayRange) -> Duration;

    /// Index into a menu of `len` entries; `len` is never zero.
    fn pick(&self, len: usize) -> usize;
}

/// Uniformly distributed delays and labels.
#[derive(Debug, Default)]
pub struct RandomDelays;

impl DelaySource for RandomDelays {
    fn delay(&self, range: &DelayRange) -> Duration {
        let ms = rand::thread_rng().gen_range(range.min_ms..=range.max_ms);
        Duration::from_millis(ms)
    }

    fn pick(&self, len: usize) -> usize {
        rand::thread_rng().gen_range(0..len)
    }
}

/// Deterministic source: always the range start, labels round-robin.
#[derive(Debug, Default)]
pub struct FixedDelays {
    next_label: AtomicUsize,
}

impl FixedDelays {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DelaySource for FixedDelays {
    fn delay(&self, range: &DelayRange) -> Duration {
        Duration::from_millis(range.min_ms)
    }

    fn pick(&self, len: usize) -> usize {
        self.next_label.fetch_add(1, Ordering::Relaxed) % len
    }
}
