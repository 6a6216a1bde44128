// SPDX-License-Identifier: Apache-2.0

//! Nanosecond timestamps, atomic counters, and accumulated-time statistics
//! used throughout the swap-out/swap-in control loop.
//!
//! Everything here is built on plain `AtomicU64`/`AtomicI64` rather than a
//! lock: the hot paths that update these primitives (completion callbacks,
//! per-charge sampling) run in contexts that must never block.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod stats;

/// Monotonic counter incremented from arbitrary threads.
///
/// Reads and writes use relaxed ordering: counters here are diagnostic,
/// not used to establish happens-before relationships between threads.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    /// Creates a counter starting at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Increments the counter by one.
    pub fn inc(&self) {
        let _ = self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the counter by `n`.
    pub fn add(&self, n: u64) {
        let _ = self.0.fetch_add(n, Ordering::Relaxed);
    }

    /// Reads the current value.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Resets the counter to zero, returning the value it held.
    pub fn reset(&self) -> u64 {
        self.0.swap(0, Ordering::Relaxed)
    }
}

/// An EWMA-maximum: tracks the highest observed sample within the current
/// epoch and never decreases until explicitly rolled over.
///
/// Mirrors the throughput tracking used by the reclamation controller:
/// `swin_throughput`/`swout_throughput` are updated with `observe` on every
/// sampling window and only move upward within an epoch.
#[derive(Debug, Default)]
pub struct EwmaMax(AtomicU64);

impl EwmaMax {
    /// Creates a tracker starting at zero (unsampled).
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Folds in a newly observed sample, keeping the running maximum.
    pub fn observe(&self, sample: u64) {
        let _ = self.0.fetch_max(sample, Ordering::Relaxed);
    }

    /// Returns the current tracked value.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Returns `true` if no sample has ever been observed.
    #[must_use]
    pub fn is_unsampled(&self) -> bool {
        self.get() == 0
    }
}

/// Accumulated-time statistic: running total, sample count, and derived
/// average, updated from a single writer (the master reclaim worker).
#[derive(Debug, Default)]
pub struct DurationStat {
    total: AtomicU64,
    count: AtomicU64,
}

impl DurationStat {
    /// Creates an empty duration statistic.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            total: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Folds in one more observed duration (in arbitrary cycle units).
    pub fn accumulate(&self, duration: u64) {
        let _ = self.total.fetch_add(duration, Ordering::Relaxed);
        let _ = self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the running average, or `0` if no samples were recorded.
    #[must_use]
    pub fn average(&self) -> u64 {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            0
        } else {
            self.total.load(Ordering::Relaxed) / count
        }
    }

    /// Returns `(total, count)`.
    #[must_use]
    pub fn totals(&self) -> (u64, u64) {
        (
            self.total.load(Ordering::Relaxed),
            self.count.load(Ordering::Relaxed),
        )
    }

    /// Zeroes the accumulated total and count.
    pub fn reset(&self) {
        self.total.store(0, Ordering::Relaxed);
        self.count.store(0, Ordering::Relaxed);
    }
}

/// Returns a monotonic timestamp in nanoseconds, used in place of a
/// cycle-accurate `rdtsc` read.
///
/// The control loop only ever subtracts two timestamps taken on the same
/// host, so wall-clock nanoseconds serve the same role as the original's
/// `get_cycles_light()` without needing a per-CPU frequency constant.
#[must_use]
pub fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_add_and_reset() {
        let c = Counter::new();
        c.inc();
        c.add(41);
        assert_eq!(c.get(), 42);
        assert_eq!(c.reset(), 42);
        assert_eq!(c.get(), 0);
    }

    #[test]
    fn ewma_max_never_decreases() {
        let e = EwmaMax::new();
        assert!(e.is_unsampled());
        e.observe(10);
        e.observe(3);
        assert_eq!(e.get(), 10);
        e.observe(55);
        assert_eq!(e.get(), 55);
    }

    #[test]
    fn duration_stat_average() {
        let d = DurationStat::new();
        assert_eq!(d.average(), 0);
        d.accumulate(10);
        d.accumulate(20);
        assert_eq!(d.average(), 15);
        assert_eq!(d.totals(), (30, 2));
        d.reset();
        assert_eq!(d.average(), 0);
    }
}
