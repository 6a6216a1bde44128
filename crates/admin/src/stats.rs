// SPDX-License-Identifier: Apache-2.0

//! Swap counter/duration-stat snapshot and reset.
//!
//! - GET `/swap/stats`
//! - POST `/swap/stats/reset`

use crate::AppState;
use axum::routing::{get, post};
use axum::{extract::State, Json, Router};
use rswap_telemetry::stats::{DurationStatKind, SwapCounterKind};
use serde::Serialize;

/// All the routes for stats snapshot/reset.
pub(crate) fn routes() -> Router<AppState> {
    Router::new()
        .route("/swap/stats", get(get_stats))
        .route("/swap/stats/reset", post(reset_stats))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CountersResponse {
    demand: u64,
    prefetch: u64,
    hit_on_cache: u64,
    total_swap_out: u64,
    total_reclaim: u64,
    batch_reclaim: u64,
    hermit_swap_out: u64,
    hermit_iso_vpages: u64,
    hermit_iso_vaddrs: u64,
    hermit_reclaim: u64,
    optimistic_failed: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DurationsResponse {
    major_swap_avg: u64,
    minor_swap_avg: u64,
    swap_out_avg: u64,
    non_swap_avg: u64,
    rdma_read_avg: u64,
    rdma_write_avg: u64,
    check_references_avg: u64,
    reverse_mapping_avg: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SwapinResponse {
    ondemand_swapin_count: u64,
    prefetch_swapin_count: u64,
    hit_on_prefetch_count: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    swapin: SwapinResponse,
    counters: CountersResponse,
    durations: DurationsResponse,
}

async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let counters = &state.counters;
    let durations = &state.durations;
    Json(StatsResponse {
        swapin: SwapinResponse {
            ondemand_swapin_count: counters.get(SwapCounterKind::Demand),
            prefetch_swapin_count: counters.get(SwapCounterKind::Prefetch),
            hit_on_prefetch_count: counters.get(SwapCounterKind::HitOnCache),
        },
        counters: CountersResponse {
            demand: counters.get(SwapCounterKind::Demand),
            prefetch: counters.get(SwapCounterKind::Prefetch),
            hit_on_cache: counters.get(SwapCounterKind::HitOnCache),
            total_swap_out: counters.get(SwapCounterKind::TotalSwapOut),
            total_reclaim: counters.get(SwapCounterKind::TotalReclaim),
            batch_reclaim: counters.get(SwapCounterKind::BatchReclaim),
            hermit_swap_out: counters.get(SwapCounterKind::HermitSwapOut),
            hermit_iso_vpages: counters.get(SwapCounterKind::HermitIsoVpages),
            hermit_iso_vaddrs: counters.get(SwapCounterKind::HermitIsoVaddrs),
            hermit_reclaim: counters.get(SwapCounterKind::HermitReclaim),
            optimistic_failed: counters.get(SwapCounterKind::OptimisticFailed),
        },
        durations: DurationsResponse {
            major_swap_avg: durations.average(DurationStatKind::MajorSwap),
            minor_swap_avg: durations.average(DurationStatKind::MinorSwap),
            swap_out_avg: durations.average(DurationStatKind::SwapOut),
            non_swap_avg: durations.average(DurationStatKind::NonSwap),
            rdma_read_avg: durations.average(DurationStatKind::RdmaRead),
            rdma_write_avg: durations.average(DurationStatKind::RdmaWrite),
            check_references_avg: durations.average(DurationStatKind::CheckReferences),
            reverse_mapping_avg: durations.average(DurationStatKind::ReverseMapping),
        },
    })
}

async fn reset_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    state.counters.reset_all();
    state.durations.reset_all();
    get_stats(State(state)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::ReadinessProbe;

    struct AlwaysReady;
    impl ReadinessProbe for AlwaysReady {
        fn is_ready(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn reset_zeroes_the_banks() {
        let state = AppState::for_test(std::sync::Arc::new(AlwaysReady));
        state.counters.inc(SwapCounterKind::Demand);
        state.counters.inc(SwapCounterKind::Demand);
        let Json(before) = get_stats(State(state.clone())).await;
        assert_eq!(before.counters.demand, 2);

        let Json(after) = reset_stats(State(state)).await;
        assert_eq!(after.counters.demand, 0);
    }
}
