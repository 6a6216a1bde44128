// SPDX-License-Identifier: Apache-2.0

//! Liveness and readiness probes.
//!
//! - GET `/healthz` - the process is up and serving the admin surface
//! - GET `/readyz` - the controller handle is initialized and the
//!   scheduler thread is alive

use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

/// Reports whether the rest of the system is ready to serve traffic.
///
/// A production binding checks the controller handle and scheduler thread;
/// tests use a plain atomic-backed fake.
pub trait ReadinessProbe: Send + Sync {
    /// Returns `true` once the controller is fully wired up.
    fn is_ready(&self) -> bool;
}

/// All the routes for liveness/readiness endpoints.
pub(crate) fn routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProbeResponse {
    status: &'static str,
}

async fn healthz() -> Json<ProbeResponse> {
    Json(ProbeResponse { status: "ok" })
}

async fn readyz(State(state): State<AppState>) -> (StatusCode, Json<ProbeResponse>) {
    if state.readiness.is_ready() {
        (StatusCode::OK, Json(ProbeResponse { status: "ok" }))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ProbeResponse {
                status: "not_ready",
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FakeProbe(AtomicBool);

    impl ReadinessProbe for FakeProbe {
        fn is_ready(&self) -> bool {
            self.0.load(Ordering::Relaxed)
        }
    }

    #[tokio::test]
    async fn healthz_always_reports_ok() {
        let Json(resp) = healthz().await;
        assert_eq!(resp.status, "ok");
    }

    #[tokio::test]
    async fn readyz_reflects_the_probe() {
        let not_ready = AppState::for_test(std::sync::Arc::new(FakeProbe(AtomicBool::new(false))));
        let (status, Json(resp)) = readyz(State(not_ready)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(resp.status, "not_ready");

        let ready = AppState::for_test(std::sync::Arc::new(FakeProbe(AtomicBool::new(true))));
        let (status, Json(resp)) = readyz(State(ready)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp.status, "ok");
    }
}
