// SPDX-License-Identifier: Apache-2.0

//! Local HTTP admin surface: exposes the control-flag/variable registry,
//! swap counter/duration-stat snapshots, and health probes.
//!
//! Bound to loopback by convention; this is an operator-local control
//! plane, not a public API, so there is no authentication beyond
//! bind-address scoping.

pub mod error;
mod flags;
pub mod health;
mod stats;
mod tenants;

use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tracing::{debug, info};

use crate::error::Error;
pub use crate::health::ReadinessProbe;
use rswap_config::ControlRegistry;
use rswap_telemetry::stats::{DurationStatBank, SwapCounterBank};
use rswap_tenant::TenantRegistry;

/// Shared state for the HTTP admin server.
#[derive(Clone)]
struct AppState {
    control: Arc<ControlRegistry>,
    counters: Arc<SwapCounterBank>,
    durations: Arc<DurationStatBank>,
    tenants: Arc<TenantRegistry>,
    readiness: Arc<dyn ReadinessProbe>,
}

impl AppState {
    #[cfg(test)]
    fn for_test(readiness: Arc<dyn ReadinessProbe>) -> Self {
        Self {
            control: Arc::new(ControlRegistry::default()),
            counters: Arc::new(SwapCounterBank::new()),
            durations: Arc::new(DurationStatBank::new()),
            tenants: Arc::new(TenantRegistry::new()),
            readiness,
        }
    }
}

/// Runs the admin HTTP server until shutdown is requested.
pub async fn run(
    bind_address: String,
    control: Arc<ControlRegistry>,
    counters: Arc<SwapCounterBank>,
    durations: Arc<DurationStatBank>,
    tenants: Arc<TenantRegistry>,
    readiness: Arc<dyn ReadinessProbe>,
    cancel: CancellationToken,
) -> Result<(), Error> {
    let app_state = AppState {
        control,
        counters,
        durations,
        tenants,
        readiness,
    };

    let app = Router::new()
        .merge(health::routes())
        .merge(flags::routes())
        .merge(stats::routes())
        .merge(tenants::routes())
        .layer(ServiceBuilder::new())
        .with_state(app_state);

    let addr = bind_address
        .parse::<SocketAddr>()
        .map_err(|e| Error::InvalidBindAddress {
            bind_address: bind_address.clone(),
            details: format!("{e}"),
        })?;

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::BindFailed {
            addr: addr.to_string(),
            details: format!("{e}"),
        })?;

    info!(endpoint = %addr, "admin HTTP server listening");
    debug!(route = "/swap/stats", method = "GET", "route registered");
    debug!(route = "/swap/flags/:name", method = "GET,PUT", "route registered");
    debug!(route = "/swap/vars/:name", method = "GET,PUT", "route registered");
    debug!(route = "/swap/tenants", method = "GET", "route registered");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
        })
        .await
        .map_err(|e| Error::ServerError {
            addr: addr.to_string(),
            details: format!("{e}"),
        })
}
