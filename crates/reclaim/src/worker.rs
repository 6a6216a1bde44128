// SPDX-License-Identifier: Apache-2.0

//! The pinned reclaim worker pool: one self-feeding work item per core,
//! admitted or held back on every iteration by the live worker-count
//! target.

use crate::accounting::MemoryAccounting;
use crate::swap_ctrl::{ReclaimMode, SwapControl};
use crate::Error;
use rswap_telemetry::now_nanos;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, trace};

/// Hard ceiling on reclaim worker slots, matching `HMT_MAX_NR_STHDS`.
pub const MAX_WORKER_SLOTS: usize = 32;

/// How many pages a single reclaim pass asks the host to evict.
const RECLAIM_BATCH_PAGES: u64 = 32;
/// Idle backoff when a worker's slot is not currently admitted.
const IDLE_SLEEP: Duration = Duration::from_micros(200);

/// What a reclaim worker actually does to the host when admitted: evict a
/// batch of pages and report how many were actually reclaimed.
///
/// A production binding drives the kernel's page-eviction path; tests use
/// a closure-backed fake.
pub trait Reclaimer: Send + Sync {
    /// Attempts to reclaim up to `target_pages`, returning the number
    /// actually reclaimed.
    fn reclaim(&self, target_pages: u64) -> u64;
}

/// One pinned OS thread repeatedly offering itself as reclaim slot `id`.
pub struct ReclaimWorker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ReclaimWorker {
    /// Spawns and pins worker `id` to `core_id`, running the self-feeding
    /// loop grounded on `hermit_high_work_func`.
    pub fn spawn(
        id: usize,
        core_id: usize,
        control: Arc<SwapControl>,
        accounting: Arc<dyn MemoryAccounting>,
        reclaimer: Arc<dyn Reclaimer>,
        mode: ReclaimMode,
        sthd_ceiling: u32,
    ) -> Result<Self, Error> {
        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = Arc::clone(&stop);
        let handle = std::thread::Builder::new()
            .name(format!("rswap-reclaim-{id}"))
            .spawn(move || {
                if let Some(core) = core_affinity::get_core_ids()
                    .and_then(|cores| cores.into_iter().find(|c| c.id == core_id))
                {
                    core_affinity::set_for_current(core);
                }
                run_loop(
                    id,
                    worker_stop,
                    control,
                    accounting.as_ref(),
                    reclaimer.as_ref(),
                    mode,
                    sthd_ceiling,
                );
            })
            .map_err(|source| Error::WorkerSpawnFailed { id, source })?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Requests this worker's loop to exit after its current iteration.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Blocks until the worker's thread has exited.
    pub fn join(mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ReclaimWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(
    id: usize,
    stop: Arc<AtomicBool>,
    control: Arc<SwapControl>,
    accounting: &dyn MemoryAccounting,
    reclaimer: &dyn Reclaimer,
    mode: ReclaimMode,
    sthd_ceiling: u32,
) {
    while !stop.load(Ordering::Acquire) && !control.is_stopping() {
        control.enter_worker();
        let admitted = (id as u32) < control.target_worker_count();
        if admitted {
            let started = now_nanos();
            let reclaimed = reclaimer.reclaim(RECLAIM_BATCH_PAGES);
            trace!(worker = id, reclaimed, "reclaim pass complete");
            if id == 0 {
                let duration = now_nanos().saturating_sub(started);
                control.accumulate_swapout(duration, reclaimed);
            }
        }

        // Re-check admission before deciding whether to immediately loop
        // again on this core, matching the work item's live re-post check.
        let still_admitted = (id as u32) < control.target_worker_count();
        control.leave_worker();

        if !still_admitted {
            if let Some(next) = control.poll(accounting, now_nanos(), mode, sthd_ceiling) {
                debug!(worker = id, next_target = next, "recomputed worker target");
            }
            std::thread::sleep(IDLE_SLEEP);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounting::MemoryAccounting;
    use std::sync::atomic::AtomicU64;
    use std::sync::Mutex;

    struct FakeAccounting {
        charged: AtomicU64,
    }

    impl MemoryAccounting for FakeAccounting {
        fn memory_max(&self) -> u64 {
            1_000_000
        }
        fn memory_current(&self) -> u64 {
            0
        }
        fn total_pg_charge(&self) -> u64 {
            self.charged.fetch_add(1, Ordering::Relaxed)
        }
    }

    struct CountingReclaimer(Mutex<u64>);

    impl Reclaimer for CountingReclaimer {
        fn reclaim(&self, target_pages: u64) -> u64 {
            *self.0.lock().unwrap() += 1;
            target_pages
        }
    }

    #[test]
    fn worker_exits_promptly_once_stopped() {
        let control = Arc::new(SwapControl::new());
        let accounting = Arc::new(FakeAccounting {
            charged: AtomicU64::new(0),
        });
        let reclaimer = Arc::new(CountingReclaimer(Mutex::new(0)));
        let worker = ReclaimWorker::spawn(
            0,
            0,
            Arc::clone(&control),
            accounting,
            reclaimer,
            ReclaimMode::Minimal,
            16,
        )
        .unwrap();
        std::thread::sleep(Duration::from_millis(5));
        worker.join();
    }
}
