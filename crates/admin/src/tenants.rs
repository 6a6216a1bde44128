// SPDX-License-Identifier: Apache-2.0

//! Read-only snapshot of the scheduler's tenant table.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::AppState;
use rswap_tenant::TrafficClass;

/// One tenant's weight, bound cores, and live per-class packet counters.
#[derive(Debug, Serialize)]
struct TenantSnapshot {
    name: String,
    weight: Option<i64>,
    cores: Vec<usize>,
    store_sent: i64,
    store_total: u64,
    load_sync_sent: i64,
    load_sync_total: u64,
    load_async_sent: i64,
    load_async_total: u64,
}

#[derive(Debug, Serialize)]
struct TenantsResponse {
    total_weight: i64,
    tenants: Vec<TenantSnapshot>,
}

pub(crate) fn routes() -> Router<AppState> {
    Router::new().route("/swap/tenants", get(get_tenants))
}

async fn get_tenants(State(state): State<AppState>) -> Json<TenantsResponse> {
    let tenants = state
        .tenants
        .ids()
        .into_iter()
        .filter_map(|id| {
            state
                .tenants
                .with_tenant(id, |tenant| TenantSnapshot {
                    name: tenant.name().to_string(),
                    weight: tenant.weight(),
                    cores: tenant.cores().to_vec(),
                    store_sent: tenant.sent_pkts(TrafficClass::Store),
                    store_total: tenant.total_pkts(TrafficClass::Store),
                    load_sync_sent: tenant.sent_pkts(TrafficClass::LoadSync),
                    load_sync_total: tenant.total_pkts(TrafficClass::LoadSync),
                    load_async_sent: tenant.sent_pkts(TrafficClass::LoadAsync),
                    load_async_total: tenant.total_pkts(TrafficClass::LoadAsync),
                })
                .ok()
        })
        .collect();

    Json(TenantsResponse {
        total_weight: state.tenants.total_weight(),
        tenants,
    })
}
