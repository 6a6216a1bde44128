// SPDX-License-Identifier: Apache-2.0

//! Speculative I/O admission control: self-disables ahead-of-fault reads
//! once their observed failure rate crosses a threshold, then re-probes
//! periodically.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Swap-ins between full counter resets.
const RESET_PERIOD: u64 = 10_000_000;
/// Trials between failure-rate evaluations.
const PROFILE_PERIOD: u64 = 100_000;
/// Fixed-point scale for the failure rate (parts per `FR_FACTOR`).
const FR_FACTOR: u64 = 100_000;
/// Failure rate above which speculation is disabled: `FR_FACTOR / 100`,
/// i.e. one percent.
const FR_THRESHOLD: u64 = FR_FACTOR / 100;

/// Tracks trial/failure counts for speculative (ahead-of-fault) swap-in
/// and decides whether it should still be attempted.
///
/// Mirrors `struct hmt_spec_counter`: a `swapin` counter gates periodic
/// resets, while a separate `trial`/`fail` pair gates the failure-rate
/// evaluation. Both run off the same call to [`SpeculativeIoCounter::record`].
#[derive(Debug, Default)]
pub struct SpeculativeIoCounter {
    swapin: AtomicU64,
    trial: AtomicU64,
    fail: AtomicU64,
    enabled: AtomicBool,
}

impl SpeculativeIoCounter {
    /// Creates a counter with speculation enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            swapin: AtomicU64::new(0),
            trial: AtomicU64::new(0),
            fail: AtomicU64::new(0),
            enabled: AtomicBool::new(true),
        }
    }

    /// Records one speculative swap-in attempt and its outcome, returning
    /// whether speculative I/O should still be attempted after this call.
    ///
    /// `succeeded` should reflect whether the speculatively-fetched page
    /// turned out to be the one actually faulted on.
    pub fn record(&self, flag_enabled: bool, succeeded: bool) -> bool {
        let swapin = self.swapin.fetch_add(1, Ordering::AcqRel) + 1;
        if swapin == RESET_PERIOD {
            self.swapin.store(0, Ordering::Release);
            self.trial.store(0, Ordering::Release);
            self.fail.store(0, Ordering::Release);
            self.enabled.store(flag_enabled, Ordering::Release);
        }

        let mut enabled = self.enabled.load(Ordering::Acquire);
        if !enabled {
            return false;
        }

        let trial = self.trial.fetch_add(1, Ordering::AcqRel) + 1;
        if !succeeded {
            let _ = self.fail.fetch_add(1, Ordering::AcqRel);
        }

        if trial == PROFILE_PERIOD {
            let fail = self.fail.swap(0, Ordering::AcqRel);
            self.trial.store(0, Ordering::Release);
            let failure_rate = FR_FACTOR * fail / trial;
            if failure_rate > FR_THRESHOLD {
                enabled = false;
                self.enabled.store(false, Ordering::Release);
            }
        }

        enabled
    }

    /// Whether speculative I/O is currently enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_enabled_when_every_trial_succeeds() {
        let counter = SpeculativeIoCounter::new();
        for _ in 0..PROFILE_PERIOD {
            assert!(counter.record(true, true));
        }
        assert!(counter.is_enabled());
    }

    #[test]
    fn disables_once_failure_rate_exceeds_one_percent() {
        let counter = SpeculativeIoCounter::new();
        for i in 0..PROFILE_PERIOD {
            // ~2% failures: comfortably over FR_THRESHOLD.
            let succeeded = i % 50 != 0;
            counter.record(true, succeeded);
        }
        assert!(!counter.is_enabled());
    }

    #[test]
    fn reset_period_re_latches_from_the_live_flag() {
        let counter = SpeculativeIoCounter::new();
        for i in 0..PROFILE_PERIOD {
            counter.record(true, i % 50 != 0);
        }
        assert!(!counter.is_enabled());

        for _ in PROFILE_PERIOD..RESET_PERIOD {
            counter.record(true, true);
        }
        assert!(counter.is_enabled());
    }

    #[test]
    fn once_disabled_record_short_circuits_to_false() {
        let counter = SpeculativeIoCounter::new();
        for i in 0..PROFILE_PERIOD {
            counter.record(true, i % 50 != 0);
        }
        assert!(!counter.record(true, true));
    }
}
