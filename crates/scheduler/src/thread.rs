// SPDX-License-Identifier: Apache-2.0

//! The scheduler's dedicated OS thread: ten store/sync-load sub-rounds
//! driven to a fixpoint, one async-load pass, an idle-core sweep, then a
//! short sleep and cooperative yield if nothing was found.

use crate::algorithm::{poll_class, poll_idle_cores};
use crate::vqlist::VqList;
use crate::Error;
use rswap_config::{ControlFlag, ControlRegistry};
use rswap_telemetry::stats::{SwapCounterBank, SwapCounterKind};
use rswap_tenant::{TenantRegistry, TrafficClass};
use rswap_transport::{completion_policy, PageOutcome, TransportRequest};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Number of store/sync-load sub-rounds attempted per scheduler iteration
/// before a single async-load pass.
const SUB_ROUNDS: usize = 10;

/// Sleep applied between iterations once a full pass finds no work.
const IDLE_SLEEP: Duration = Duration::from_micros(2);

/// Accepts a resolved request for actual submission to the transport.
pub trait Dispatcher: Send + Sync {
    /// Submits `request`, returning `true` on success.
    fn dispatch(&self, request: TransportRequest) -> bool;
}

/// Runs the scheduler's polling loop until told to stop.
///
/// `bw_control_enabled` is read fresh every iteration so the admin surface
/// can toggle it live.
pub struct SchedulerThread {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SchedulerThread {
    /// Spawns the scheduler thread pinned to `core_id`.
    pub fn spawn(
        core_id: usize,
        registry: Arc<TenantRegistry>,
        vqlist: Arc<VqList>,
        dispatcher: Arc<dyn Dispatcher>,
        control: Arc<ControlRegistry>,
        counters: Arc<SwapCounterBank>,
        bw_control_enabled: Arc<AtomicBool>,
    ) -> Result<Self, Error> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();

        let core = core_affinity::CoreId { id: core_id };
        let handle = std::thread::Builder::new()
            .name(format!("rswap-scheduler-{core_id}"))
            .spawn(move || {
                if !core_affinity::set_for_current(core) {
                    tracing::warn!(core_id, "failed to pin scheduler thread to core");
                }
                run_loop(
                    &thread_stop,
                    core_id,
                    &registry,
                    &vqlist,
                    dispatcher.as_ref(),
                    &control,
                    &counters,
                    &bw_control_enabled,
                );
            })
            .map_err(|source| Error::ThreadSpawnFailed { source })?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Requests the scheduler thread stop after its current iteration.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Requests a stop and blocks until the thread has exited.
    pub fn join(mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SchedulerThread {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Reserves a transport admission slot, dispatches, then applies the
/// completion policy and releases the slot — the full §4.2 lifecycle for
/// one request, inline: the [`Dispatcher`] contract is synchronous, so a
/// request's entire in-flight window is this one call.
///
/// Tenant `sent_pkts`/the scheduler-wide total are incremented by the
/// caller (`poll_class`) as soon as a request is pulled off its vqueue;
/// this function pairs that with the matching completion decrement once
/// the request's outcome is known.
fn submit_and_complete(
    vqlist: &VqList,
    registry: &TenantRegistry,
    control: &ControlRegistry,
    counters: &SwapCounterBank,
    dispatcher: &dyn Dispatcher,
    request: TransportRequest,
) {
    let core = request.core;
    let class = request.class;

    let reserved = vqlist.reserve_transport(core, class, || 0).is_ok();
    if !reserved {
        tracing::warn!(core, ?class, "transport queue saturated, dropping request");
    }
    let succeeded = reserved && dispatcher.dispatch(request);
    if reserved {
        vqlist.release_transport(core, class);
    }

    let lazy_poll = control.flag(ControlFlag::LazyPoll);
    match completion_policy(class, succeeded, lazy_poll) {
        PageOutcome::Unlock => counters.inc(SwapCounterKind::TotalSwapOut),
        PageOutcome::MarkUpToDateAndUnlock | PageOutcome::MarkUpToDateKeepLocked => match class {
            TrafficClass::LoadSync => counters.inc(SwapCounterKind::Demand),
            TrafficClass::LoadAsync => counters.inc(SwapCounterKind::Prefetch),
            TrafficClass::Store => {}
        },
        PageOutcome::LeaveLockedOnFailure => {
            tracing::debug!(core, ?class, "transport request failed, page left locked");
        }
    }

    if let Some(owner) = vqlist.owner(core) {
        let _ = registry.with_tenant(owner, |t| t.record_completed(class));
        vqlist.record_total_completed(class);
    }
}

fn run_loop(
    stop: &AtomicBool,
    scheduler_core: usize,
    registry: &TenantRegistry,
    vqlist: &VqList,
    dispatcher: &dyn Dispatcher,
    control: &ControlRegistry,
    counters: &SwapCounterBank,
    bw_control_enabled: &AtomicBool,
) {
    while !stop.load(Ordering::Acquire) {
        let found = run_iteration(
            scheduler_core,
            registry,
            vqlist,
            dispatcher,
            control,
            counters,
            bw_control_enabled,
        );
        if !found {
            std::thread::sleep(IDLE_SLEEP);
            std::thread::yield_now();
        }
    }
}

/// Runs one full scheduler iteration; returns whether any work was found.
fn run_iteration(
    scheduler_core: usize,
    registry: &TenantRegistry,
    vqlist: &VqList,
    dispatcher: &dyn Dispatcher,
    control: &ControlRegistry,
    counters: &SwapCounterBank,
    bw_control_enabled: &AtomicBool,
) -> bool {
    let bw_control = bw_control_enabled.load(Ordering::Acquire);
    let mut found_any = false;

    for _ in 0..SUB_ROUNDS {
        loop {
            let store_progress = poll_class(registry, vqlist, TrafficClass::Store, bw_control, |req| {
                submit_and_complete(vqlist, registry, control, counters, dispatcher, req);
            });
            let sync_progress = poll_class(registry, vqlist, TrafficClass::LoadSync, bw_control, |req| {
                submit_and_complete(vqlist, registry, control, counters, dispatcher, req);
            });
            found_any |= store_progress || sync_progress;
            if !store_progress && !sync_progress {
                break;
            }
        }
        let async_progress = poll_class(registry, vqlist, TrafficClass::LoadAsync, bw_control, |req| {
            submit_and_complete(vqlist, registry, control, counters, dispatcher, req);
        });
        found_any |= async_progress;
    }

    let idle_progress = poll_idle_cores(vqlist, scheduler_core, |req| {
        submit_and_complete(vqlist, registry, control, counters, dispatcher, req);
    });
    found_any |= idle_progress;

    found_any
}
