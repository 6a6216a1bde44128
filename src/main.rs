// SPDX-License-Identifier: Apache-2.0

//! `rswapd`: the far-memory paging core daemon.
//!
//! Parses configuration from CLI flags and environment variables, wires
//! the module handle's subsystems together, and runs until interrupted.

mod sim;

use clap::Parser;
use rswap_config::{layout, RswapConfig};
use rswap_controller::RswapHandle;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = RswapConfig::parse();

    let max_pages = config.module.rmsize * (1u64 << 30) / layout::PAGE_SIZE;
    let accounting = Arc::new(sim::SimAccounting::new(max_pages));
    let dispatcher = Arc::new(sim::SimDispatcher);
    let reclaimer = Arc::new(sim::SimReclaimer);

    let handle = match RswapHandle::start(config, dispatcher, accounting, reclaimer) {
        Ok(handle) => handle,
        Err(err) => {
            tracing::error!(error = %err, "failed to start module handle");
            std::process::exit(1);
        }
    };

    info!("rswapd running, press ctrl-c to stop");

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to create tokio runtime for signal handling");
    rt.block_on(async {
        let _ = tokio::signal::ctrl_c().await;
    });

    info!("shutdown requested, stopping module handle");
    if let Err(err) = handle.shutdown() {
        tracing::error!(error = %err, "error during module handle shutdown");
        std::process::exit(1);
    }
}
