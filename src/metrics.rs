//! Detector metrics.
//!
//! Plain atomic counters, readable at any time from any thread. These are the
//! externally observable health signals of the detector itself: how many
//! passes ran, how many were skipped, and whether samples were ever lost to
//! profile-lock contention.

use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing counter.
#[derive(Debug)]
pub struct Counter {
    name: &'static str,
    value: AtomicU64,
}

impl Counter {
    const fn new(name: &'static str) -> Self {
        Self {
            name,
            value: AtomicU64::new(0),
        }
    }

    /// Increments the counter by 1.
    pub fn increment(&self) {
        self.add(1);
    }

    /// Adds `value` to the counter.
    pub fn add(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    /// Returns the current value.
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Returns the counter name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

/// Counters published by a [`LeakDetector`](crate::detector::LeakDetector).
#[derive(Debug)]
pub struct DetectorMetrics {
    /// Passes that ran to completion (with or without findings).
    pub passes_completed: Counter,
    /// Passes skipped for any reason (disabled, quiesce, validation, budget).
    pub passes_skipped: Counter,
    /// Tasks reported as leaked, over the process lifetime.
    pub tasks_reported: Counter,
    /// Samples dropped because the profile write lock stayed contended.
    pub samples_lost: Counter,
}

impl DetectorMetrics {
    /// Creates a zeroed counter set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            passes_completed: Counter::new("taskleak.passes_completed"),
            passes_skipped: Counter::new("taskleak.passes_skipped"),
            tasks_reported: Counter::new("taskleak.tasks_reported"),
            samples_lost: Counter::new("taskleak.samples_lost"),
        }
    }
}

impl Default for DetectorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = DetectorMetrics::new();
        metrics.passes_completed.increment();
        metrics.passes_completed.add(2);
        assert_eq!(metrics.passes_completed.get(), 3);
        assert_eq!(metrics.passes_skipped.get(), 0);
    }

    #[test]
    fn names_are_namespaced() {
        let metrics = DetectorMetrics::new();
        assert_eq!(metrics.samples_lost.name(), "taskleak.samples_lost");
    }
}
