// SPDX-License-Identifier: Apache-2.0

//! The tenant registry: named tenants with a bandwidth weight, a set of
//! bound cores, and per-traffic-class packet counters, mirroring the
//! `rswap_proc_*` lifecycle this scheduler is built on.

pub mod error;

pub use error::Error;

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use tracing::info;

/// The three kinds of traffic a scheduler round services independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrafficClass {
    /// Page writes to remote memory.
    Store,
    /// Synchronous (blocking) page reads from remote memory.
    LoadSync,
    /// Asynchronous (prefetch) page reads from remote memory.
    LoadAsync,
}

/// The traffic classes, in their canonical scheduling order: stores and
/// synchronous loads are driven to a fixpoint each round before a single
/// asynchronous-load pass.
pub const TRAFFIC_CLASSES: [TrafficClass; 3] = [
    TrafficClass::Store,
    TrafficClass::LoadSync,
    TrafficClass::LoadAsync,
];

impl TrafficClass {
    fn index(self) -> usize {
        match self {
            Self::Store => 0,
            Self::LoadSync => 1,
            Self::LoadAsync => 2,
        }
    }
}

/// Opaque handle into a [`TenantRegistry`]. Carries no data of its own and
/// is safe to copy into a queue triple as a non-owning back-pointer: the
/// registry, not the pointer, owns the tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TenantId(usize);

/// A registered tenant: a name, a bandwidth weight, the cores it owns, and
/// live per-traffic-class packet counters.
#[derive(Debug)]
pub struct Tenant {
    name: String,
    /// `-1` means "uninitialized", matching the sentinel the weight field
    /// starts at before registration sets it.
    weight: AtomicI64,
    cores: Vec<usize>,
    sent_pkts: [AtomicI64; 3],
    total_pkts: [AtomicU64; 3],
}

impl Tenant {
    fn new(name: String) -> Self {
        Self {
            name,
            weight: AtomicI64::new(-1),
            cores: Vec::new(),
            sent_pkts: Default::default(),
            total_pkts: Default::default(),
        }
    }

    /// The tenant's display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The tenant's current bandwidth weight, or `None` if it has been
    /// cleared and not yet re-weighted.
    #[must_use]
    pub fn weight(&self) -> Option<i64> {
        let w = self.weight.load(Ordering::Acquire);
        (w > 0).then_some(w)
    }

    /// Cores this tenant's fault/reclaim threads run on.
    #[must_use]
    pub fn cores(&self) -> &[usize] {
        &self.cores
    }

    /// Currently in-flight (sent but not yet completed) packet count for a
    /// traffic class.
    #[must_use]
    pub fn sent_pkts(&self, class: TrafficClass) -> i64 {
        self.sent_pkts[class.index()].load(Ordering::Acquire)
    }

    /// Lifetime packet count for a traffic class.
    #[must_use]
    pub fn total_pkts(&self, class: TrafficClass) -> u64 {
        self.total_pkts[class.index()].load(Ordering::Acquire)
    }

    /// Records that one packet of `class` was just dispatched.
    pub fn record_sent(&self, class: TrafficClass) {
        let _ = self.sent_pkts[class.index()].fetch_add(1, Ordering::AcqRel);
        let _ = self.total_pkts[class.index()].fetch_add(1, Ordering::AcqRel);
    }

    /// Records that one in-flight packet of `class` just completed.
    pub fn record_completed(&self, class: TrafficClass) {
        let _ = self.sent_pkts[class.index()].fetch_sub(1, Ordering::AcqRel);
    }

    fn clear_weight(&self) {
        self.weight.store(-1, Ordering::Release);
        for c in &self.sent_pkts {
            c.store(0, Ordering::Release);
        }
    }
}

/// Registry of all tenants known to the scheduler, plus the multiplicative
/// aggregate `total_weight` used by the weighted-fair baseline computation.
///
/// `total_weight` is preserved as the original's multiplicative aggregate:
/// registering a tenant multiplies it in, clearing a tenant's weight
/// divides it back out.
#[derive(Debug)]
pub struct TenantRegistry {
    tenants: parking_lot::RwLock<Vec<Option<Tenant>>>,
    total_weight: AtomicI64,
}

impl TenantRegistry {
    /// Creates an empty registry with `total_weight` at the neutral
    /// multiplicative identity, `1`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tenants: parking_lot::RwLock::new(Vec::new()),
            total_weight: AtomicI64::new(1),
        }
    }

    /// The current multiplicative aggregate of every registered tenant's
    /// weight.
    #[must_use]
    pub fn total_weight(&self) -> i64 {
        self.total_weight.load(Ordering::Acquire)
    }

    /// Registers a new tenant bound to `cores` with the given weight.
    ///
    /// Multiplies `total_weight` by `weight`, matching
    /// `rswap_proc_set_weight`'s `total_bw_weight *= bw_weight`.
    pub fn register(
        &self,
        name: impl Into<String>,
        weight: i64,
        cores: Vec<usize>,
    ) -> Result<TenantId, Error> {
        if weight <= 0 {
            return Err(Error::NonPositiveWeight(weight));
        }
        if cores.is_empty() {
            return Err(Error::NoCoresBound);
        }

        let mut tenant = Tenant::new(name.into());
        tenant.weight.store(weight, Ordering::Release);
        tenant.cores = cores;

        let mut tenants = self.tenants.write();
        let id = TenantId(tenants.len());
        info!(tenant = tenant.name, weight, "registered tenant");
        tenants.push(Some(tenant));
        drop(tenants);

        let _ = self.total_weight.fetch_mul_i64(weight);
        Ok(id)
    }

    /// Clears a tenant's weight and divides it back out of `total_weight`,
    /// without removing the tenant's registry slot.
    pub fn clear_weight(&self, id: TenantId) -> Result<(), Error> {
        let tenants = self.tenants.read();
        let tenant = tenants
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(Error::UnknownTenant(id))?;
        if let Some(weight) = tenant.weight() {
            let _ = self.total_weight.fetch_div_i64(weight);
        }
        tenant.clear_weight();
        Ok(())
    }

    /// Re-weights a tenant, clearing its prior weight first if it already
    /// had one (matching `rswap_proc_set_weight`'s re-initialization path).
    pub fn set_weight(&self, id: TenantId, weight: i64, cores: Vec<usize>) -> Result<(), Error> {
        if weight <= 0 {
            return Err(Error::NonPositiveWeight(weight));
        }
        if cores.is_empty() {
            return Err(Error::NoCoresBound);
        }
        if self.tenants.read().get(id.0).and_then(Option::as_ref).is_none() {
            return Err(Error::UnknownTenant(id));
        }
        self.clear_weight(id)?;

        let mut tenants = self.tenants.write();
        let tenant = tenants
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(Error::UnknownTenant(id))?;
        tenant.weight.store(weight, Ordering::Release);
        tenant.cores = cores;
        drop(tenants);

        let _ = self.total_weight.fetch_mul_i64(weight);
        Ok(())
    }

    /// Removes a tenant from the registry entirely.
    pub fn deregister(&self, id: TenantId) -> Result<(), Error> {
        self.clear_weight(id)?;
        let mut tenants = self.tenants.write();
        let slot = tenants.get_mut(id.0).ok_or(Error::UnknownTenant(id))?;
        *slot = None;
        Ok(())
    }

    /// Runs `f` with a read-only view of a tenant.
    pub fn with_tenant<R>(&self, id: TenantId, f: impl FnOnce(&Tenant) -> R) -> Result<R, Error> {
        let tenants = self.tenants.read();
        let tenant = tenants
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(Error::UnknownTenant(id))?;
        Ok(f(tenant))
    }

    /// Returns the ids of every currently-registered (non-deregistered)
    /// tenant, in registration order.
    #[must_use]
    pub fn ids(&self) -> Vec<TenantId> {
        self.tenants
            .read()
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|_| TenantId(i)))
            .collect()
    }
}

trait AtomicI64MulDiv {
    fn fetch_mul_i64(&self, rhs: i64) -> i64;
    fn fetch_div_i64(&self, rhs: i64) -> i64;
}

impl AtomicI64MulDiv for AtomicI64 {
    fn fetch_mul_i64(&self, rhs: i64) -> i64 {
        self.fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| Some(v * rhs))
            .expect("fetch_update with an always-Some closure never fails")
    }

    fn fetch_div_i64(&self, rhs: i64) -> i64 {
        self.fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| Some(v / rhs))
            .expect("fetch_update with an always-Some closure never fails")
    }
}
