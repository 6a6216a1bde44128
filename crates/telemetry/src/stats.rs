// SPDX-License-Identifier: Apache-2.0

//! Named banks of swap counters and duration statistics backing the control
//! surface's `reset_swap_stats`/`get_swap_stats` operations.

use crate::{Counter, DurationStat};

/// Identifies one entry of [`SwapCounterBank`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum SwapCounterKind {
    /// On-demand (non-prefetch) swap-ins.
    Demand,
    /// Swap-ins issued speculatively ahead of the faulting access.
    Prefetch,
    /// Swap-ins that hit a page already brought in by a prior prefetch.
    HitOnCache,
    /// All swap-outs, regardless of path.
    TotalSwapOut,
    /// All reclaim invocations, regardless of path.
    TotalReclaim,
    /// Reclaim invocations that used the batched path.
    BatchReclaim,
    /// Swap-outs driven by the reclamation controller specifically.
    HermitSwapOut,
    /// Victim pages isolated by the reclamation controller.
    HermitIsoVpages,
    /// Victim virtual addresses isolated by the reclamation controller.
    HermitIsoVaddrs,
    /// Reclaim invocations driven by the reclamation controller.
    HermitReclaim,
    /// Speculative I/O trials that failed.
    OptimisticFailed,
}

const COUNTER_KINDS: [SwapCounterKind; 11] = [
    SwapCounterKind::Demand,
    SwapCounterKind::Prefetch,
    SwapCounterKind::HitOnCache,
    SwapCounterKind::TotalSwapOut,
    SwapCounterKind::TotalReclaim,
    SwapCounterKind::BatchReclaim,
    SwapCounterKind::HermitSwapOut,
    SwapCounterKind::HermitIsoVpages,
    SwapCounterKind::HermitIsoVaddrs,
    SwapCounterKind::HermitReclaim,
    SwapCounterKind::OptimisticFailed,
];

impl SwapCounterKind {
    fn index(self) -> usize {
        COUNTER_KINDS
            .iter()
            .position(|k| *k == self)
            .expect("SwapCounterKind must be listed in COUNTER_KINDS")
    }
}

/// Identifies one entry of [`DurationStatBank`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum DurationStatKind {
    /// Time spent servicing a major (remote) swap fault.
    MajorSwap,
    /// Time spent servicing a minor (cache-hit) swap fault.
    MinorSwap,
    /// Time spent in the swap-out path.
    SwapOut,
    /// Time spent in a non-swap page fault.
    NonSwap,
    /// Remote read (load) latency.
    RdmaRead,
    /// Remote write (store) latency.
    RdmaWrite,
    /// Time checking page references before reclaim.
    CheckReferences,
    /// Time spent walking the reverse map.
    ReverseMapping,
}

const DURATION_KINDS: [DurationStatKind; 8] = [
    DurationStatKind::MajorSwap,
    DurationStatKind::MinorSwap,
    DurationStatKind::SwapOut,
    DurationStatKind::NonSwap,
    DurationStatKind::RdmaRead,
    DurationStatKind::RdmaWrite,
    DurationStatKind::CheckReferences,
    DurationStatKind::ReverseMapping,
];

impl DurationStatKind {
    fn index(self) -> usize {
        DURATION_KINDS
            .iter()
            .position(|k| *k == self)
            .expect("DurationStatKind must be listed in DURATION_KINDS")
    }
}

/// Fixed bank of named monotonic counters, reset together by
/// `reset_swap_stats()`.
#[derive(Debug, Default)]
pub struct SwapCounterBank {
    counters: [Counter; COUNTER_KINDS.len()],
}

impl SwapCounterBank {
    /// Creates a bank with every counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the named counter by one.
    pub fn inc(&self, kind: SwapCounterKind) {
        self.counters[kind.index()].inc();
    }

    /// Reads the named counter's current value.
    #[must_use]
    pub fn get(&self, kind: SwapCounterKind) -> u64 {
        self.counters[kind.index()].get()
    }

    /// Zeroes every counter in the bank.
    pub fn reset_all(&self) {
        for counter in &self.counters {
            let _ = counter.reset();
        }
    }
}

/// Fixed bank of named duration statistics, reset together by
/// `reset_swap_stats()`.
#[derive(Debug, Default)]
pub struct DurationStatBank {
    stats: [DurationStat; DURATION_KINDS.len()],
}

impl DurationStatBank {
    /// Creates a bank with every statistic empty.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a newly observed duration into the named statistic.
    pub fn accumulate(&self, kind: DurationStatKind, duration: u64) {
        self.stats[kind.index()].accumulate(duration);
    }

    /// Returns the running average for the named statistic.
    #[must_use]
    pub fn average(&self, kind: DurationStatKind) -> u64 {
        self.stats[kind.index()].average()
    }

    /// Zeroes every statistic in the bank.
    pub fn reset_all(&self) {
        for stat in &self.stats {
            stat.reset();
        }
    }
}

/// The three counters exposed directly by `get_swap_stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapStatsSnapshot {
    /// Count of on-demand swap-ins.
    pub ondemand_swapin_count: u64,
    /// Count of speculative/prefetch swap-ins.
    pub prefetch_swapin_count: u64,
    /// Count of swap-ins that hit a page already fetched by prefetch.
    pub hit_on_prefetch_count: u64,
}

impl SwapCounterBank {
    /// Builds the three-counter snapshot returned by `get_swap_stats`.
    #[must_use]
    pub fn snapshot(&self) -> SwapStatsSnapshot {
        SwapStatsSnapshot {
            ondemand_swapin_count: self.get(SwapCounterKind::Demand),
            prefetch_swapin_count: self.get(SwapCounterKind::Prefetch),
            hit_on_prefetch_count: self.get(SwapCounterKind::HitOnCache),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_independent_and_reset_together() {
        let bank = SwapCounterBank::new();
        bank.inc(SwapCounterKind::Demand);
        bank.inc(SwapCounterKind::Demand);
        bank.inc(SwapCounterKind::Prefetch);
        assert_eq!(bank.get(SwapCounterKind::Demand), 2);
        assert_eq!(bank.get(SwapCounterKind::Prefetch), 1);
        assert_eq!(bank.get(SwapCounterKind::HitOnCache), 0);

        bank.reset_all();
        assert_eq!(bank.get(SwapCounterKind::Demand), 0);
        assert_eq!(bank.get(SwapCounterKind::Prefetch), 0);
    }

    #[test]
    fn snapshot_reflects_the_three_swapin_counters() {
        let bank = SwapCounterBank::new();
        bank.inc(SwapCounterKind::Demand);
        bank.inc(SwapCounterKind::Prefetch);
        bank.inc(SwapCounterKind::Prefetch);
        bank.inc(SwapCounterKind::HitOnCache);

        let snap = bank.snapshot();
        assert_eq!(snap.ondemand_swapin_count, 1);
        assert_eq!(snap.prefetch_swapin_count, 2);
        assert_eq!(snap.hit_on_prefetch_count, 1);
    }

    #[test]
    fn duration_stats_reset_together() {
        let bank = DurationStatBank::new();
        bank.accumulate(DurationStatKind::MajorSwap, 100);
        bank.accumulate(DurationStatKind::MajorSwap, 200);
        assert_eq!(bank.average(DurationStatKind::MajorSwap), 150);
        bank.reset_all();
        assert_eq!(bank.average(DurationStatKind::MajorSwap), 0);
    }
}
