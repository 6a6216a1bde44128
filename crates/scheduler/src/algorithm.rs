// SPDX-License-Identifier: Apache-2.0

//! The weighted-fair per-class polling round, implemented as pure logic
//! over a tenant registry and queue list so it can be exercised without a
//! real transport or OS thread.

use crate::vqlist::VqList;
use rswap_tenant::{TenantId, TenantRegistry, TrafficClass};
use rswap_transport::TransportRequest;

fn active_pressure(registry: &TenantRegistry, vqlist: &VqList, id: TenantId, class: TrafficClass) -> i64 {
    let backlog: i64 = registry
        .with_tenant(id, |t| {
            t.cores()
                .iter()
                .map(|&core| vqlist.backlog(core, class) as i64)
                .sum::<i64>()
        })
        .unwrap_or(0);
    let sent = registry.with_tenant(id, |t| t.sent_pkts(class)).unwrap_or(0);
    sent + backlog
}

/// Selects the tenant with the minimum weighted active pressure among
/// tenants that currently have any pending work for `class`.
///
/// Returns `None` if no tenant has any active work.
fn select_baseline(
    registry: &TenantRegistry,
    vqlist: &VqList,
    class: TrafficClass,
) -> Option<(TenantId, i64)> {
    let total_weight = registry.total_weight();
    let mut best: Option<(TenantId, i64, i64)> = None; // (id, weighted, active)

    for id in registry.ids() {
        let active = active_pressure(registry, vqlist, id, class);
        if active == 0 {
            continue;
        }
        let weight = match registry.with_tenant(id, |t| t.weight()) {
            Ok(Some(w)) => w,
            _ => continue,
        };
        let weighted = (total_weight / weight) * active;
        let is_better = match &best {
            None => true,
            Some((_, best_weighted, _)) => weighted < *best_weighted,
        };
        if is_better {
            best = Some((id, weighted, active));
        }
    }

    best.map(|(id, _, active)| (id, active))
}

/// Runs one polling round for a single traffic class.
///
/// `dispatch` is invoked once per request this round selects for
/// submission; it should return `true` on success. A failed dispatch is
/// logged by the caller's `dispatch` closure and simply does not advance
/// the budget for that attempt (the request is dropped, matching the
/// documented fallback of treating dispatch failure like a completion
/// failure).
///
/// Returns `true` if anything was dispatched this round.
pub fn poll_class(
    registry: &TenantRegistry,
    vqlist: &VqList,
    class: TrafficClass,
    bw_control_enabled: bool,
    mut dispatch: impl FnMut(TransportRequest),
) -> bool {
    let Some((baseline, active_baseline)) = select_baseline(registry, vqlist, class) else {
        return false;
    };

    let active_tenant_count = registry
        .ids()
        .into_iter()
        .filter(|&id| active_pressure(registry, vqlist, id, class) > 0)
        .count();

    let cores = registry
        .with_tenant(baseline, |t| t.cores().to_vec())
        .unwrap_or_default();

    if active_tenant_count <= 1 {
        let mut dispatched_any = false;
        for core in cores {
            if let Some(req) = vqlist.try_dequeue(core, class) {
                dispatch(req);
                let _ = registry.with_tenant(baseline, |t| t.record_sent(class));
                vqlist.record_total_sent(class);
                dispatched_any = true;
            }
        }
        return dispatched_any;
    }

    // Multi-tenant round: only the baseline is served. The generic budget
    // formula `active(baseline) * t.weight / baseline.weight -
    // t.sent_pkts[C]` degenerates to `active(baseline) - baseline.sent` for
    // t == baseline, since the weight ratio cancels.
    let baseline_sent = registry
        .with_tenant(baseline, |t| t.sent_pkts(class))
        .unwrap_or(0);
    let mut budget = if bw_control_enabled {
        active_baseline - baseline_sent
    } else {
        cores.len() as i64
    };

    let mut dispatched_any = false;
    if budget <= 0 || cores.is_empty() {
        return false;
    }

    loop {
        let mut progress = false;
        for &core in &cores {
            if budget == 0 {
                return dispatched_any;
            }
            if let Some(req) = vqlist.try_dequeue(core, class) {
                dispatch(req);
                let _ = registry.with_tenant(baseline, |t| t.record_sent(class));
                vqlist.record_total_sent(class);
                budget -= 1;
                progress = true;
                dispatched_any = true;
            }
        }
        if !progress {
            break;
        }
    }
    dispatched_any
}

/// Services cores bound to no tenant: dequeues one request per class and
/// dispatches it.
pub fn poll_idle_cores(
    vqlist: &VqList,
    scheduler_core: usize,
    mut dispatch: impl FnMut(TransportRequest),
) -> bool {
    let mut dispatched_any = false;
    for core in 0..vqlist.num_cores() {
        if core == scheduler_core || vqlist.owner(core).is_some() {
            continue;
        }
        for class in rswap_tenant::TRAFFIC_CLASSES {
            if let Some(req) = vqlist.try_dequeue(core, class) {
                dispatch(req);
                dispatched_any = true;
            }
        }
    }
    dispatched_any
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn req(core: usize, class: TrafficClass) -> TransportRequest {
        TransportRequest {
            core,
            chunk_idx: 0,
            offset_in_chunk: 0,
            class,
        }
    }

    #[test]
    fn single_active_tenant_drains_one_request_per_core() {
        let registry = TenantRegistry::new();
        let id = registry.register("snappy", 1, vec![0, 1]).unwrap();
        let vqlist = VqList::new(4, 8, 8);
        vqlist.bind(0, id);
        vqlist.bind(1, id);
        vqlist.enqueue(0, TrafficClass::Store, req(0, TrafficClass::Store));
        vqlist.enqueue(1, TrafficClass::Store, req(1, TrafficClass::Store));
        vqlist.enqueue(1, TrafficClass::Store, req(1, TrafficClass::Store));

        let dispatched = RefCell::new(Vec::new());
        let any = poll_class(&registry, &vqlist, TrafficClass::Store, true, |r| {
            dispatched.borrow_mut().push(r.core);
        });
        assert!(any);
        assert_eq!(*dispatched.borrow(), vec![0, 1]);
        assert_eq!(vqlist.backlog(1, TrafficClass::Store), 1);
        registry
            .with_tenant(id, |t| assert_eq!(t.sent_pkts(TrafficClass::Store), 2))
            .unwrap();
        assert_eq!(vqlist.total_sent_pkts(TrafficClass::Store), 2);
    }

    #[test]
    fn no_active_work_returns_false() {
        let registry = TenantRegistry::new();
        let _id = registry.register("snappy", 1, vec![0]).unwrap();
        let vqlist = VqList::new(2, 8, 8);
        assert!(!poll_class(&registry, &vqlist, TrafficClass::Store, true, |_| {}));
    }

    #[test]
    fn lower_weight_tenant_with_pending_work_becomes_baseline() {
        let registry = TenantRegistry::new();
        let heavy = registry.register("spark", 4, vec![0]).unwrap();
        let light = registry.register("snappy", 1, vec![1]).unwrap();
        let vqlist = VqList::new(4, 8, 8);
        vqlist.bind(0, heavy);
        vqlist.bind(1, light);

        // Both have equal backlog; weighted(heavy) = total/4*1, weighted(light)=total/1*1.
        // heavy has lower weighted pressure and should be the baseline.
        vqlist.enqueue(0, TrafficClass::Store, req(0, TrafficClass::Store));
        vqlist.enqueue(1, TrafficClass::Store, req(1, TrafficClass::Store));

        let dispatched = RefCell::new(Vec::new());
        poll_class(&registry, &vqlist, TrafficClass::Store, true, |r| {
            dispatched.borrow_mut().push(r.core)
        });
        assert_eq!(*dispatched.borrow(), vec![0]);
    }

    #[test]
    fn idle_core_path_skips_bound_and_scheduler_cores() {
        let vqlist = VqList::new(3, 8, 8);
        let registry = TenantRegistry::new();
        let id = registry.register("t", 1, vec![0]).unwrap();
        vqlist.bind(0, id);
        vqlist.enqueue(0, TrafficClass::Store, req(0, TrafficClass::Store));
        vqlist.enqueue(1, TrafficClass::Store, req(1, TrafficClass::Store));
        vqlist.enqueue(2, TrafficClass::Store, req(2, TrafficClass::Store));

        let dispatched = RefCell::new(Vec::new());
        // core 2 is the scheduler's own core, core 0 is bound; only core 1 should run.
        poll_idle_cores(&vqlist, 2, |r| dispatched.borrow_mut().push(r.core));
        assert_eq!(*dispatched.borrow(), vec![1]);
    }
}
