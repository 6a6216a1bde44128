// SPDX-License-Identifier: Apache-2.0

//! Default trait implementations wired into the daemon binary.
//!
//! Per the module's design notes, cgroup memory accounting, reclaim
//! primitives, and the remote fabric are all collaborators modeled as
//! traits rather than owned by this crate; the host kernel's page-fault
//! path, the wire protocol to a remote memory server, and cgroup
//! introspection are out of scope here. These implementations are the
//! deterministic simulation backends the module ships with until a real
//! fabric/cgroup integration is wired in at the deployment site.

use rswap_reclaim::{MemoryAccounting, Reclaimer};
use rswap_scheduler::Dispatcher;
use rswap_transport::TransportRequest;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Tracks a simulated cgroup's page ceiling, current charge, and lifetime
/// charge counter, standing in for `memory.max`/`memory.current` reads.
pub struct SimAccounting {
    max: AtomicU64,
    current: AtomicU64,
    charged: AtomicU64,
}

impl SimAccounting {
    /// Seeds the simulated cgroup with a page ceiling derived from the
    /// configured remote memory size.
    #[must_use]
    pub fn new(max_pages: u64) -> Self {
        Self {
            max: AtomicU64::new(max_pages),
            current: AtomicU64::new(0),
            charged: AtomicU64::new(0),
        }
    }

    /// Records a simulated page charge, as the real swap-in path would on
    /// every major fault serviced from the remote pool.
    pub fn charge(&self, pages: u64) {
        let _ = self.current.fetch_add(pages, Ordering::AcqRel);
        let _ = self.charged.fetch_add(pages, Ordering::AcqRel);
    }

    /// Records pages freed by a reclaim pass.
    pub fn uncharge(&self, pages: u64) {
        let _ = self.current.fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
            Some(v.saturating_sub(pages))
        });
    }
}

impl MemoryAccounting for SimAccounting {
    fn memory_max(&self) -> u64 {
        self.max.load(Ordering::Acquire)
    }

    fn memory_current(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }

    fn total_pg_charge(&self) -> u64 {
        self.charged.load(Ordering::Acquire)
    }
}

/// Accepts every submitted request, simulating a fabric with unlimited
/// in-flight capacity and an always-reachable remote peer.
pub struct SimDispatcher;

impl Dispatcher for SimDispatcher {
    fn dispatch(&self, request: TransportRequest) -> bool {
        debug!(
            core = request.core,
            chunk = request.chunk_idx,
            offset = request.offset_in_chunk,
            class = ?request.class,
            "dispatched request to simulated fabric"
        );
        true
    }
}

/// Reclaims exactly the requested number of pages, simulating eviction
/// that never fails, so the control loop's worker-count derivation can be
/// exercised without a real page-table walk.
pub struct SimReclaimer;

impl Reclaimer for SimReclaimer {
    fn reclaim(&self, target_pages: u64) -> u64 {
        target_pages
    }
}
