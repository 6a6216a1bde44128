// SPDX-License-Identifier: Apache-2.0

//! The control block the reclamation controller samples and mutates on
//! every charge event: throughput watermarks, swap-out duration stats, and
//! the derived worker-thread ceiling.

use crate::accounting::MemoryAccounting;
use crate::speculative::SpeculativeIoCounter;
use crate::throughput::pages_per_second;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

/// How the controller derives the target worker count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReclaimMode {
    /// Hermit's own adaptive policy, driven by watermarks.
    Adaptive,
    /// Simulates an aggressive fixed-threshold policy.
    Aggressive,
    /// Simulates a minimal fixed-threshold policy.
    Minimal,
}

impl ReclaimMode {
    /// Maps a clamped `reclaim_mode` control variable (`0`, `1`, or `2`)
    /// onto a mode.
    #[must_use]
    pub fn from_control_var(value: u32) -> Self {
        match value {
            0 => Self::Adaptive,
            1 => Self::Aggressive,
            _ => Self::Minimal,
        }
    }
}

/// Weight given to available pages versus worker count in the phase-3
/// (about-to-exhaust) branch of the adaptive policy.
const ALPHA: u64 = 128;
/// Multiplier separating the high and low watermarks.
const BETA: u64 = 16;
/// Minimum time between two throughput samples.
const UPDATE_PERIOD_NANOS: u64 = 1_000_000;
/// Scales the refault-distance step size; `1 / GAMMA` is the step's
/// fraction of current memory usage.
const GAMMA: u64 = 2000;
/// Available-page floor used by the aggressive/minimal simulated policies.
const SIMULATED_POLICY_FLOOR: u64 = 2048;

#[derive(Debug, Default, Clone, Copy)]
struct SwoutDuration {
    nr_pages: u64,
    total: u64,
    cnt: u64,
    avg: u64,
}

#[derive(Debug, Default)]
struct State {
    swin_ts: [u64; 2],
    nr_pg_charged: [u64; 2],
    swin_throughput: u64,
    swout_throughput: u64,
    swout_dur: SwoutDuration,
    low_watermark: u64,
    rft_dist_prev_val: u64,
    log_cnt: u64,
}

/// The per-cgroup (here: per top-level module handle) swap control block.
///
/// `rft_dist_total`/`rft_dist_cnt` are accumulated lock-free from the page
/// fault path via [`SwapControl::record_refault_distance`] and only
/// consumed, under `state`'s lock, by the watermark update.
pub struct SwapControl {
    state: Mutex<State>,
    rft_dist_total: AtomicU64,
    rft_dist_cnt: AtomicU64,
    active_worker_count: AtomicU32,
    target_worker_count: AtomicU32,
    stop: AtomicBool,
    master_up: AtomicBool,
    speculative: SpeculativeIoCounter,
}

impl Default for SwapControl {
    fn default() -> Self {
        Self::new()
    }
}

impl SwapControl {
    /// Creates a freshly initialized control block; `master_up` starts
    /// `true`, matching `hermit_init_memcg`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            rft_dist_total: AtomicU64::new(0),
            rft_dist_cnt: AtomicU64::new(0),
            active_worker_count: AtomicU32::new(0),
            target_worker_count: AtomicU32::new(0),
            stop: AtomicBool::new(false),
            master_up: AtomicBool::new(true),
            speculative: SpeculativeIoCounter::new(),
        }
    }

    /// Records one observed refault distance for the low-watermark update.
    pub fn record_refault_distance(&self, distance: u64) {
        let _ = self.rft_dist_total.fetch_add(distance, Ordering::AcqRel);
        let _ = self.rft_dist_cnt.fetch_add(1, Ordering::AcqRel);
    }

    /// Records one speculative (ahead-of-fault) swap-in attempt and
    /// returns whether speculative I/O should still be attempted, per
    /// [`SpeculativeIoCounter::record`].
    pub fn record_speculative_swapin(&self, flag_enabled: bool, succeeded: bool) -> bool {
        self.speculative.record(flag_enabled, succeeded)
    }

    /// Whether speculative I/O is currently enabled, for a caller deciding
    /// whether to issue an ahead-of-fault read at all.
    #[must_use]
    pub fn speculative_io_enabled(&self) -> bool {
        self.speculative.is_enabled()
    }

    /// The worker count last derived by [`Self::poll`].
    #[must_use]
    pub fn target_worker_count(&self) -> u32 {
        self.target_worker_count.load(Ordering::Acquire)
    }

    /// Number of worker slots currently inside a reclaim pass.
    #[must_use]
    pub fn active_worker_count(&self) -> u32 {
        self.active_worker_count.load(Ordering::Acquire)
    }

    /// Marks one worker as having entered its reclaim iteration.
    pub(crate) fn enter_worker(&self) {
        let _ = self.active_worker_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Marks one worker as having left its reclaim iteration.
    pub(crate) fn leave_worker(&self) {
        let _ = self.active_worker_count.fetch_sub(1, Ordering::AcqRel);
    }

    /// Marks the controller as stopping and blocks (spin-yielding) until
    /// every worker has left its reclaim pass, mirroring
    /// `hermit_cleanup_memcg`.
    pub fn stop_and_wait(&self) {
        self.stop.store(true, Ordering::Release);
        while self.active_worker_count() > 0 {
            std::thread::yield_now();
        }
    }

    /// Whether the controller has been told to stop.
    #[must_use]
    pub fn is_stopping(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Whether the master worker slot has been initialized.
    #[must_use]
    pub fn master_up(&self) -> bool {
        self.master_up.load(Ordering::Acquire)
    }

    /// Samples throughput (throttled to once per [`UPDATE_PERIOD_NANOS`])
    /// and recomputes the target worker count, if the control block's lock
    /// is free. Returns `None` without blocking if another caller is
    /// already inside this critical section, mirroring the original's
    /// `spin_trylock_irq` skip-if-busy behavior.
    pub fn poll(
        &self,
        accounting: &dyn MemoryAccounting,
        now_nanos: u64,
        mode: ReclaimMode,
        max_worker_ceiling: u32,
    ) -> Option<u32> {
        let mut state = self.state.try_lock()?;
        self.update_swap_ctrl_locked(&mut state, accounting, now_nanos);
        let next = self.get_worker_count_locked(&mut state, accounting, mode, max_worker_ceiling);
        self.target_worker_count.store(next, Ordering::Release);
        Some(next)
    }

    /// Folds in one reclaim pass's duration and page count; only the
    /// master slot (`id == 0`) calls this.
    pub fn accumulate_swapout(&self, duration_nanos: u64, nr_reclaimed: u64) {
        let mut state = self.state.lock();
        state.swout_dur.nr_pages += nr_reclaimed;
        state.swout_dur.total += duration_nanos;
        state.swout_dur.cnt += 1;
        state.swout_dur.avg = state.swout_dur.total / state.swout_dur.cnt;
        state.swout_throughput =
            pages_per_second(state.swout_dur.nr_pages, state.swout_dur.total);
    }

    fn update_swap_ctrl_locked(
        &self,
        state: &mut State,
        accounting: &dyn MemoryAccounting,
        now_nanos: u64,
    ) {
        if state.swin_ts[0] == 0 {
            *state = State::default();
            state.swin_ts[0] = now_nanos;
            state.nr_pg_charged[0] = accounting.total_pg_charge();
            return;
        }
        state.swin_ts[1] = now_nanos;
        if state.swin_ts[1] - state.swin_ts[0] < UPDATE_PERIOD_NANOS {
            return;
        }
        state.log_cnt += 1;
        self.update_high_watermark_locked(state, accounting);
        self.update_low_watermark_locked(state, accounting);
    }

    fn update_high_watermark_locked(&self, state: &mut State, accounting: &dyn MemoryAccounting) {
        state.nr_pg_charged[1] = accounting.total_pg_charge();
        let sample = pages_per_second(
            state.nr_pg_charged[1].saturating_sub(state.nr_pg_charged[0]),
            state.swin_ts[1] - state.swin_ts[0],
        );
        state.swin_throughput = state.swin_throughput.max(sample);
        state.swin_ts[0] = state.swin_ts[1];
        state.nr_pg_charged[0] = state.nr_pg_charged[1];
    }

    fn update_low_watermark_locked(&self, state: &mut State, accounting: &dyn MemoryAccounting) {
        let cnt = self.rft_dist_cnt.swap(0, Ordering::AcqRel);
        if cnt == 0 {
            return;
        }
        let total = self.rft_dist_total.swap(0, Ordering::AcqRel);
        let avg = total / cnt;
        let step = accounting.memory_current() / GAMMA;
        if state.rft_dist_prev_val <= avg {
            state.low_watermark += step;
        } else {
            state.low_watermark = 0;
        }
        state.rft_dist_prev_val = avg;
    }

    fn get_worker_count_locked(
        &self,
        state: &mut State,
        accounting: &dyn MemoryAccounting,
        mode: ReclaimMode,
        max_worker_ceiling: u32,
    ) -> u32 {
        let avail = accounting.available_pages();

        if mode == ReclaimMode::Adaptive && state.swin_throughput != 0 && state.swout_throughput != 0 {
            let swap_intensity = state.swin_throughput / state.swout_throughput;
            let max_worker_cnt = u64::from(max_worker_ceiling).min(swap_intensity);
            let high_watermark = max_worker_cnt * ALPHA;
            let candidate_low = high_watermark * BETA;
            if state.low_watermark > candidate_low {
                // keep the stored (higher) watermark
            } else {
                state.low_watermark = candidate_low;
            }

            if avail > state.low_watermark {
                0
            } else if avail >= high_watermark {
                1
            } else {
                let worker_cnt = (high_watermark - avail) / ALPHA;
                worker_cnt.clamp(1, u64::from(max_worker_ceiling)) as u32
            }
        } else if mode == ReclaimMode::Aggressive {
            if avail < SIMULATED_POLICY_FLOOR {
                max_worker_ceiling
            } else {
                0
            }
        } else {
            // Minimal policy, and the Adaptive policy before both
            // throughput samples have warmed up.
            u32::from(avail < SIMULATED_POLICY_FLOOR)
        }
    }
}
