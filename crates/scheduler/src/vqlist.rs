// SPDX-License-Identifier: Apache-2.0

//! The per-core bundle of three submission queues, and the binding from a
//! core to the tenant that owns it.

use rswap_channel::VQueue;
use rswap_tenant::{TenantId, TrafficClass, TRAFFIC_CLASSES};
use rswap_transport::{TransportQueue, TransportRequest};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

struct VqTriple {
    queues: [VQueue<TransportRequest>; 3],
    transport: [TransportQueue; 3],
    owner: RwLock<Option<TenantId>>,
}

impl VqTriple {
    fn new(initial_depth: usize, transport_depth: usize) -> Self {
        Self {
            queues: [
                VQueue::new(initial_depth),
                VQueue::new(initial_depth),
                VQueue::new(initial_depth),
            ],
            transport: [
                TransportQueue::new(transport_depth),
                TransportQueue::new(transport_depth),
                TransportQueue::new(transport_depth),
            ],
            owner: RwLock::new(None),
        }
    }

    fn queue(&self, class: TrafficClass) -> &VQueue<TransportRequest> {
        &self.queues[class_index(class)]
    }

    fn transport(&self, class: TrafficClass) -> &TransportQueue {
        &self.transport[class_index(class)]
    }
}

fn class_index(class: TrafficClass) -> usize {
    TRAFFIC_CLASSES
        .iter()
        .position(|c| *c == class)
        .expect("TrafficClass is always one of TRAFFIC_CLASSES")
}

/// One queue-triple per core, addressed by core id `0..num_cores`.
///
/// This is the non-owning back-pointer arrangement described for the
/// scheduler: a core's triple stores the *id* of the tenant that owns it,
/// never a reference back into the tenant registry.
pub struct VqList {
    triples: Vec<VqTriple>,
    /// Scheduler-wide dispatched-but-not-completed count per class, the
    /// aggregate the per-tenant `sent_pkts[c]` counters must sum to.
    total_sent: [AtomicI64; 3],
}

impl VqList {
    /// Creates a list with one triple per core, each submission queue
    /// starting at `initial_depth` and each transport admission queue at
    /// `transport_depth`.
    #[must_use]
    pub fn new(num_cores: usize, initial_depth: usize, transport_depth: usize) -> Self {
        Self {
            triples: (0..num_cores)
                .map(|_| VqTriple::new(initial_depth, transport_depth))
                .collect(),
            total_sent: Default::default(),
        }
    }

    /// Number of cores this list covers.
    #[must_use]
    pub fn num_cores(&self) -> usize {
        self.triples.len()
    }

    /// Binds a core to a tenant, replacing any prior binding.
    pub fn bind(&self, core: usize, tenant: TenantId) {
        *self.triples[core].owner.write().expect("vqlist owner lock poisoned") = Some(tenant);
    }

    /// Clears a core's tenant binding.
    pub fn unbind(&self, core: usize) {
        *self.triples[core].owner.write().expect("vqlist owner lock poisoned") = None;
    }

    /// The tenant currently bound to `core`, if any.
    #[must_use]
    pub fn owner(&self, core: usize) -> Option<TenantId> {
        *self.triples[core].owner.read().expect("vqlist owner lock poisoned")
    }

    /// Pushes a request onto `core`'s queue for `class`.
    pub fn enqueue(&self, core: usize, class: TrafficClass, request: TransportRequest) {
        let _ = self.triples[core].queue(class).enqueue(request);
    }

    /// Pops the next request from `core`'s queue for `class`, if any.
    #[must_use]
    pub fn try_dequeue(&self, core: usize, class: TrafficClass) -> Option<TransportRequest> {
        self.triples[core].queue(class).try_dequeue().ok()
    }

    /// Backlog length of `core`'s queue for `class`.
    #[must_use]
    pub fn backlog(&self, core: usize, class: TrafficClass) -> usize {
        self.triples[core].queue(class).len()
    }

    /// Reserves one in-flight transport slot for `(core, class)`, draining
    /// completions via `poll_batch` and retrying on rollback.
    pub fn reserve_transport(
        &self,
        core: usize,
        class: TrafficClass,
        poll_batch: impl FnMut() -> usize,
    ) -> Result<(), rswap_transport::Error> {
        self.triples[core].transport(class).reserve(poll_batch)
    }

    /// Releases one in-flight transport slot for `(core, class)` on
    /// completion.
    pub fn release_transport(&self, core: usize, class: TrafficClass) {
        self.triples[core].transport(class).release();
    }

    /// Current in-flight transport count for `(core, class)`.
    #[must_use]
    pub fn transport_in_flight(&self, core: usize, class: TrafficClass) -> usize {
        self.triples[core].transport(class).in_flight()
    }

    /// Records that one packet of `class` was just dispatched on behalf of
    /// a tenant, incrementing the scheduler-wide aggregate.
    pub fn record_total_sent(&self, class: TrafficClass) {
        let _ = self.total_sent[class_index(class)].fetch_add(1, Ordering::AcqRel);
    }

    /// Records that one in-flight packet of `class` just completed,
    /// decrementing the scheduler-wide aggregate.
    pub fn record_total_completed(&self, class: TrafficClass) {
        let _ = self.total_sent[class_index(class)].fetch_sub(1, Ordering::AcqRel);
    }

    /// The scheduler-wide dispatched-but-not-completed count for `class`.
    ///
    /// `TenantRegistry::ids().map(|id| tenant.sent_pkts(class)).sum()` must
    /// always equal this value.
    #[must_use]
    pub fn total_sent_pkts(&self, class: TrafficClass) -> i64 {
        self.total_sent[class_index(class)].load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(core: usize) -> TransportRequest {
        TransportRequest {
            core,
            chunk_idx: 0,
            offset_in_chunk: 0,
            class: TrafficClass::Store,
        }
    }

    #[test]
    fn binding_round_trips() {
        let list = VqList::new(4, 8, 8);
        assert_eq!(list.owner(1), None);
        let id = rswap_tenant::TenantRegistry::new()
            .register("t", 1, vec![1])
            .unwrap();
        list.bind(1, id);
        assert_eq!(list.owner(1), Some(id));
        list.unbind(1);
        assert_eq!(list.owner(1), None);
    }

    #[test]
    fn enqueue_dequeue_is_fifo_per_core_and_class() {
        let list = VqList::new(2, 8, 8);
        list.enqueue(0, TrafficClass::Store, req(0));
        list.enqueue(0, TrafficClass::Store, req(0));
        assert_eq!(list.backlog(0, TrafficClass::Store), 2);
        assert!(list.try_dequeue(0, TrafficClass::Store).is_some());
        assert_eq!(list.backlog(0, TrafficClass::Store), 1);
        assert!(list.try_dequeue(0, TrafficClass::LoadSync).is_none());
    }

    #[test]
    fn transport_admission_tracks_in_flight_and_the_total_sent_aggregate() {
        let list = VqList::new(1, 8, 20);
        assert_eq!(list.transport_in_flight(0, TrafficClass::Store), 0);
        list.reserve_transport(0, TrafficClass::Store, || 0).unwrap();
        assert_eq!(list.transport_in_flight(0, TrafficClass::Store), 1);
        list.release_transport(0, TrafficClass::Store);
        assert_eq!(list.transport_in_flight(0, TrafficClass::Store), 0);

        list.record_total_sent(TrafficClass::Store);
        list.record_total_sent(TrafficClass::Store);
        assert_eq!(list.total_sent_pkts(TrafficClass::Store), 2);
        list.record_total_completed(TrafficClass::Store);
        assert_eq!(list.total_sent_pkts(TrafficClass::Store), 1);
    }
}
