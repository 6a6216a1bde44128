// SPDX-License-Identifier: Apache-2.0

//! Top-level module handle for the far-memory paging core.
//!
//! Wires together the control-flag/variable registry, tenant registry,
//! per-core submission queues, the weighted-fair scheduler threads, the
//! reclamation worker pool, and the admin HTTP surface, following the
//! same thread-per-core layout the scheduler and reclaim crates each use
//! on their own: every long-running piece gets a dedicated OS thread
//! pinned to a core, coordinated only through shared atomics and explicit
//! stop signals.
//!
//! Remote I/O and host memory accounting are injected as trait objects
//! ([`rswap_scheduler::Dispatcher`], [`rswap_reclaim::Reclaimer`],
//! [`rswap_reclaim::MemoryAccounting`]) rather than implemented here: this
//! crate owns orchestration, not the fabric or the host kernel binding.

pub mod error;
pub mod thread_task;

pub use error::Error;

use rswap_config::{ControlFlag, ControlRegistry, RswapConfig};
use rswap_reclaim::{MemoryAccounting, ReclaimController, ReclaimMode, Reclaimer, SwapControl};
use rswap_scheduler::{Dispatcher, SchedulerThread, VqList};
use rswap_tenant::{TenantId, TenantRegistry, TrafficClass};
use rswap_telemetry::stats::{DurationStatBank, SwapCounterBank};
use rswap_transport::ChunkTable;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use thread_task::{spawn_thread_local_task, ThreadLocalTaskHandle};
use tracing::info;

/// Wraps a caller-supplied [`Dispatcher`] to gate async-load (ahead-of-fault)
/// requests on the reclamation controller's speculative I/O admission, and
/// to feed each attempt's outcome back into it.
///
/// Store and sync-load requests pass straight through: only the `LoadAsync`
/// class is speculative by definition.
struct SpeculativeGatingDispatcher {
    inner: Arc<dyn Dispatcher>,
    control: Arc<ControlRegistry>,
    swap_control: Arc<SwapControl>,
    counters: Arc<SwapCounterBank>,
}

impl Dispatcher for SpeculativeGatingDispatcher {
    fn dispatch(&self, request: rswap_transport::TransportRequest) -> bool {
        if request.class != TrafficClass::LoadAsync {
            return self.inner.dispatch(request);
        }
        if !self.swap_control.speculative_io_enabled() {
            return false;
        }
        let succeeded = self.inner.dispatch(request);
        if !succeeded {
            self.counters.inc(rswap_telemetry::stats::SwapCounterKind::OptimisticFailed);
        }
        let flag_enabled = self.control.flag(ControlFlag::SpeculativeIo);
        self.swap_control
            .record_speculative_swapin(flag_enabled, succeeded);
        succeeded
    }
}

/// Reports readiness to the admin surface once every subsystem has been
/// wired up and the scheduler threads are alive.
struct HandleReadiness(Arc<AtomicBool>);

impl rswap_admin::ReadinessProbe for HandleReadiness {
    fn is_ready(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Owns every subsystem's shared state and worker threads for one running
/// module instance.
pub struct RswapHandle {
    control: Arc<ControlRegistry>,
    counters: Arc<SwapCounterBank>,
    durations: Arc<DurationStatBank>,
    tenants: Arc<TenantRegistry>,
    vqlist: Arc<VqList>,
    chunk_table: Arc<RwLock<ChunkTable>>,
    scheduler_threads: Vec<SchedulerThread>,
    reclaim: Option<ReclaimController>,
    admin: ThreadLocalTaskHandle<(), rswap_admin::error::Error>,
    readiness: Arc<AtomicBool>,
    bw_control_enabled: Arc<AtomicBool>,
}

impl RswapHandle {
    /// Starts every subsystem: binds the control registry, spawns one
    /// scheduler thread per available core, starts the reclaim worker
    /// pool, and launches the admin HTTP surface on its own thread.
    pub fn start(
        config: RswapConfig,
        dispatcher: Arc<dyn Dispatcher>,
        accounting: Arc<dyn MemoryAccounting>,
        reclaimer: Arc<dyn Reclaimer>,
    ) -> Result<Self, Error> {
        let cores: Vec<usize> = core_affinity::get_core_ids()
            .ok_or(Error::CoreDetectionUnavailable)?
            .into_iter()
            .map(|c| c.id)
            .collect();
        if cores.is_empty() {
            return Err(Error::NotEnoughCores {
                requested: 1,
                available: 0,
            });
        }

        let control = Arc::new(config.build_control_registry());
        let counters = Arc::new(SwapCounterBank::new());
        let durations = Arc::new(DurationStatBank::new());
        let tenants = Arc::new(TenantRegistry::new());
        let vqlist = Arc::new(VqList::new(
            cores.len(),
            config.vqueue_depth,
            config.transport_queue_depth,
        ));
        let chunk_table = Arc::new(RwLock::new(ChunkTable::new(config.chunk_count())));
        let bw_control_enabled = Arc::new(AtomicBool::new(false));

        let mode = ReclaimMode::from_control_var(control.var(rswap_config::ControlVar::ReclaimMode));
        let sthd_ceiling = control.var(rswap_config::ControlVar::SthdCnt);
        let reclaim_controller = ReclaimController::start(
            &cores,
            Arc::clone(&accounting),
            reclaimer,
            mode,
            sthd_ceiling,
        )?;
        info!(workers = cores.len(), "reclaim worker pool started");

        let gating_dispatcher: Arc<dyn Dispatcher> = Arc::new(SpeculativeGatingDispatcher {
            inner: dispatcher,
            control: Arc::clone(&control),
            swap_control: Arc::clone(reclaim_controller.control()),
            counters: Arc::clone(&counters),
        });
        let reclaim = Some(reclaim_controller);

        let mut scheduler_threads = Vec::with_capacity(cores.len());
        for &core_id in &cores {
            scheduler_threads.push(SchedulerThread::spawn(
                core_id,
                Arc::clone(&tenants),
                Arc::clone(&vqlist),
                Arc::clone(&gating_dispatcher),
                Arc::clone(&control),
                Arc::clone(&counters),
                Arc::clone(&bw_control_enabled),
            )?);
        }
        info!(cores = cores.len(), "scheduler threads started");

        let readiness = Arc::new(AtomicBool::new(false));
        let admin_control = Arc::clone(&control);
        let admin_counters = Arc::clone(&counters);
        let admin_durations = Arc::clone(&durations);
        let admin_tenants = Arc::clone(&tenants);
        let admin_readiness = Arc::new(HandleReadiness(Arc::clone(&readiness)));
        let bind_address = config.admin_bind_address.clone();
        let admin = spawn_thread_local_task("rswap-admin", move |cancel| {
            rswap_admin::run(
                bind_address,
                admin_control,
                admin_counters,
                admin_durations,
                admin_tenants,
                admin_readiness,
                cancel,
            )
        })?;

        readiness.store(true, Ordering::Release);

        Ok(Self {
            control,
            counters,
            durations,
            tenants,
            vqlist,
            chunk_table,
            scheduler_threads,
            reclaim,
            admin,
            readiness,
            bw_control_enabled,
        })
    }

    /// Registers a tenant with the given weight and bound cores, binding
    /// each core's submission queue triple to it.
    pub fn register_tenant(
        &self,
        name: impl Into<String>,
        weight: i64,
        cores: Vec<usize>,
    ) -> Result<TenantId, Error> {
        let id = self.tenants.register(name, weight, cores.clone())?;
        for core in cores {
            self.vqlist.bind(core, id);
        }
        Ok(id)
    }

    /// Deregisters a tenant and unbinds its cores.
    pub fn deregister_tenant(&self, id: TenantId) -> Result<(), Error> {
        self.tenants.with_tenant(id, |tenant| tenant.cores().to_vec())?
            .into_iter()
            .for_each(|core| self.vqlist.unbind(core));
        self.tenants.deregister(id)?;
        Ok(())
    }

    /// Resolves `page_offset` against the chunk table and submits the
    /// resulting request to `core`'s vqueue for the scheduler to drain.
    ///
    /// Fails if the page offset addresses a chunk outside the table or one
    /// that has never been mapped; the caller never enqueues an
    /// unresolvable request.
    pub fn submit(&self, core: usize, class: TrafficClass, page_offset: u64) -> Result<(), Error> {
        let (chunk_idx, offset_in_chunk, _chunk) = self
            .chunk_table
            .read()
            .expect("chunk table lock poisoned")
            .resolve(page_offset)?;
        let request = rswap_transport::TransportRequest {
            core,
            chunk_idx,
            offset_in_chunk,
            class,
        };
        self.vqlist.enqueue(core, class, request);
        Ok(())
    }

    /// Binds a remote region to chunk `idx`, making page offsets inside it
    /// resolvable by [`Self::submit`].
    pub fn map_chunk(
        &self,
        idx: usize,
        remote_addr: u64,
        remote_key: u32,
        mapped_size: u64,
    ) -> Result<(), Error> {
        self.chunk_table
            .write()
            .expect("chunk table lock poisoned")
            .map(idx, remote_addr, remote_key, mapped_size)?;
        Ok(())
    }

    /// Enables or disables per-tenant bandwidth control.
    pub fn set_bandwidth_control(&self, enabled: bool) {
        self.bw_control_enabled.store(enabled, Ordering::Release);
    }

    /// The shared control-flag/variable registry, for direct inspection
    /// outside the admin surface.
    #[must_use]
    pub fn control(&self) -> &Arc<ControlRegistry> {
        &self.control
    }

    /// The shared swap counter bank.
    #[must_use]
    pub fn counters(&self) -> &Arc<SwapCounterBank> {
        &self.counters
    }

    /// The shared duration-stat bank.
    #[must_use]
    pub fn durations(&self) -> &Arc<DurationStatBank> {
        &self.durations
    }

    /// The shared tenant registry, for direct inspection of per-tenant
    /// packet counters outside the admin surface.
    #[must_use]
    pub fn tenants(&self) -> &Arc<TenantRegistry> {
        &self.tenants
    }

    /// Stops every subsystem, in reverse startup order: admin surface,
    /// scheduler threads, then the reclaim worker pool.
    pub fn shutdown(mut self) -> Result<(), Error> {
        self.readiness.store(false, Ordering::Release);
        self.admin.shutdown_and_join()?;
        for thread in self.scheduler_threads.drain(..) {
            thread.join();
        }
        if let Some(reclaim) = self.reclaim.take() {
            reclaim.shutdown();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use rswap_config::RswapConfig;
    use rswap_reclaim::Reclaimer;
    use std::sync::atomic::AtomicU64;

    struct NoopDispatcher;
    impl Dispatcher for NoopDispatcher {
        fn dispatch(&self, _request: rswap_transport::TransportRequest) -> bool {
            true
        }
    }

    struct FakeAccounting {
        max: AtomicU64,
        current: AtomicU64,
        charged: AtomicU64,
    }
    impl MemoryAccounting for FakeAccounting {
        fn memory_max(&self) -> u64 {
            self.max.load(Ordering::Relaxed)
        }
        fn memory_current(&self) -> u64 {
            self.current.load(Ordering::Relaxed)
        }
        fn total_pg_charge(&self) -> u64 {
            self.charged.load(Ordering::Relaxed)
        }
    }

    struct NoopReclaimer;
    impl Reclaimer for NoopReclaimer {
        fn reclaim(&self, _target_pages: u64) -> u64 {
            0
        }
    }

    fn test_config(admin_port: u16) -> RswapConfig {
        let mut cfg = RswapConfig::parse_from(["rswapd"]);
        cfg.admin_bind_address = format!("127.0.0.1:{admin_port}");
        cfg
    }

    // `RswapHandle::start` detects real cores, pins real OS threads, and
    // binds a real admin listener; exercised once here end to end, every
    // other test below drives the tenant/vqueue wiring directly against a
    // handle built the same way.
    #[test]
    fn start_wires_every_subsystem_and_shuts_down_cleanly() {
        let handle = RswapHandle::start(
            test_config(17_600),
            Arc::new(NoopDispatcher),
            Arc::new(FakeAccounting {
                max: AtomicU64::new(1_000_000),
                current: AtomicU64::new(0),
                charged: AtomicU64::new(0),
            }),
            Arc::new(NoopReclaimer),
        )
        .unwrap();

        assert!(!handle.scheduler_threads.is_empty());
        assert!(handle.reclaim.is_some());
        handle.shutdown().unwrap();
    }

    #[test]
    fn register_tenant_binds_its_cores_then_deregister_unbinds_them() {
        let handle = RswapHandle::start(
            test_config(17_601),
            Arc::new(NoopDispatcher),
            Arc::new(FakeAccounting {
                max: AtomicU64::new(1_000_000),
                current: AtomicU64::new(0),
                charged: AtomicU64::new(0),
            }),
            Arc::new(NoopReclaimer),
        )
        .unwrap();

        let id = handle.register_tenant("snappy", 4, vec![0]).unwrap();
        assert_eq!(handle.vqlist.owner(0), Some(id));

        handle.deregister_tenant(id).unwrap();
        assert_eq!(handle.vqlist.owner(0), None);

        handle.shutdown().unwrap();
    }

    #[test]
    fn submit_enqueues_onto_the_named_core() {
        let handle = RswapHandle::start(
            test_config(17_602),
            Arc::new(NoopDispatcher),
            Arc::new(FakeAccounting {
                max: AtomicU64::new(1_000_000),
                current: AtomicU64::new(0),
                charged: AtomicU64::new(0),
            }),
            Arc::new(NoopReclaimer),
        )
        .unwrap();

        let _id = handle.register_tenant("memcached", 1, vec![0]).unwrap();
        handle.map_chunk(0, 0xDEAD_0000, 7, 8 * (1 << 30)).unwrap();
        handle.submit(0, TrafficClass::Store, 1).unwrap();
        assert_eq!(handle.vqlist.backlog(0, TrafficClass::Store), 1);

        handle.shutdown().unwrap();
    }

    #[test]
    fn bandwidth_control_toggle_is_observable() {
        let handle = RswapHandle::start(
            test_config(17_603),
            Arc::new(NoopDispatcher),
            Arc::new(FakeAccounting {
                max: AtomicU64::new(1_000_000),
                current: AtomicU64::new(0),
                charged: AtomicU64::new(0),
            }),
            Arc::new(NoopReclaimer),
        )
        .unwrap();

        assert!(!handle.bw_control_enabled.load(Ordering::Acquire));
        handle.set_bandwidth_control(true);
        assert!(handle.bw_control_enabled.load(Ordering::Acquire));

        handle.shutdown().unwrap();
    }
}
