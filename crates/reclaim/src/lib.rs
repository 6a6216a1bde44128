// SPDX-License-Identifier: Apache-2.0

//! Proactive reclamation controller.
//!
//! Adapts the number of active reclaim workers to swap-in/swap-out
//! throughput and refault distance, and gates speculative (ahead-of-fault)
//! swap-in on its own observed failure rate.

pub mod accounting;
mod error;
pub mod speculative;
pub mod swap_ctrl;
mod throughput;
pub mod worker;

pub use accounting::MemoryAccounting;
pub use error::Error;
// Owned by `SwapControl`; re-exported so a caller gating ahead-of-fault
// reads can name the type directly if it wants to test against it.
pub use speculative::SpeculativeIoCounter;
pub use swap_ctrl::{ReclaimMode, SwapControl};
pub use worker::{ReclaimWorker, Reclaimer, MAX_WORKER_SLOTS};

/// Owns the worker pool and shared control block for one top-level module
/// handle's reclamation loop.
pub struct ReclaimController {
    control: std::sync::Arc<SwapControl>,
    workers: Vec<ReclaimWorker>,
}

impl ReclaimController {
    /// Spawns `worker_count` pinned reclaim workers on cores
    /// `cores[0..worker_count]`.
    pub fn start(
        cores: &[usize],
        accounting: std::sync::Arc<dyn MemoryAccounting>,
        reclaimer: std::sync::Arc<dyn Reclaimer>,
        mode: ReclaimMode,
        sthd_ceiling: u32,
    ) -> Result<Self, Error> {
        if cores.len() > MAX_WORKER_SLOTS {
            return Err(Error::TooManyWorkers {
                requested: cores.len(),
                max: MAX_WORKER_SLOTS,
            });
        }
        let control = std::sync::Arc::new(SwapControl::new());
        let mut workers = Vec::with_capacity(cores.len());
        for (id, &core_id) in cores.iter().enumerate() {
            workers.push(ReclaimWorker::spawn(
                id,
                core_id,
                std::sync::Arc::clone(&control),
                std::sync::Arc::clone(&accounting),
                std::sync::Arc::clone(&reclaimer),
                mode,
                sthd_ceiling,
            )?);
        }
        Ok(Self { control, workers })
    }

    /// The shared control block, exposed for the admin surface's stats and
    /// the ahead-of-fault caller's [`SwapControl::record_refault_distance`].
    #[must_use]
    pub fn control(&self) -> &std::sync::Arc<SwapControl> {
        &self.control
    }

    /// Stops every worker and waits for them to drain, mirroring
    /// `hermit_cleanup_memcg`.
    pub fn shutdown(self) {
        self.control.stop_and_wait();
        for worker in self.workers {
            worker.join();
        }
    }
}
