// SPDX-License-Identifier: Apache-2.0

//! Runtime configuration for the swap core: module parameters, queue sizing,
//! and the boolean/integer control surface, loaded from CLI flags with
//! environment-variable fallback via `clap`.
//!
//! Config structs here stay small and typed, each field documented with the
//! reasoning behind its default, rather than a generic key-value bag.

pub mod flags;
pub mod layout;

pub use flags::{ControlFlag, ControlRegistry, ControlVar};

use clap::Parser;

/// Default depth of one vqueue before the enlarge-on-overflow slow path
/// triggers. Sized to absorb a full scheduler round (ten store/sync-load
/// sub-rounds) worth of single-core submissions without enlarging under
/// ordinary load.
pub const DEFAULT_VQUEUE_DEPTH: usize = 256;

/// Default depth of one transport queue. The scheduler throttles a tenant's
/// in-flight requests at `depth - 16`, so this leaves headroom for the
/// drain backoff to have somewhere to drain into.
pub const DEFAULT_TRANSPORT_QUEUE_DEPTH: usize = 48;

/// Module parameters controlling how the swap core reaches its remote peer
/// and how much remote memory it manages.
#[derive(Debug, Clone, Parser)]
pub struct ModuleParams {
    /// Remote server IPv4 address.
    #[arg(long, env = "RSWAP_SIP", default_value = "127.0.0.1")]
    pub sip: String,

    /// Remote server port.
    #[arg(long, env = "RSWAP_SPORT", default_value_t = 9400)]
    pub sport: u16,

    /// Remote memory size, in GiB. Divided into `REGION_SIZE_GB`-sized
    /// chunks up to `MAX_REGION_NUM`, per [`layout`].
    #[arg(long, env = "RSWAP_RMSIZE", default_value_t = 128)]
    pub rmsize: u64,
}

/// Top-level configuration assembled at startup, covering module
/// parameters, queue sizing, initial control-surface defaults, and the
/// admin server's bind address.
#[derive(Debug, Clone, Parser)]
#[command(name = "rswapd", about = "Far-memory paging core")]
pub struct RswapConfig {
    /// Remote-peer and remote-memory module parameters.
    #[command(flatten)]
    pub module: ModuleParams,

    /// Depth of each per-core, per-tenant vqueue before it enlarges.
    #[arg(long, env = "RSWAP_VQUEUE_DEPTH", default_value_t = DEFAULT_VQUEUE_DEPTH)]
    pub vqueue_depth: usize,

    /// Depth of each transport queue.
    #[arg(long, env = "RSWAP_TRANSPORT_QUEUE_DEPTH", default_value_t = DEFAULT_TRANSPORT_QUEUE_DEPTH)]
    pub transport_queue_depth: usize,

    /// Initial value of the `sthd_cnt` control variable.
    #[arg(long, env = "RSWAP_STHD_CNT", default_value_t = 16)]
    pub initial_sthd_cnt: u32,

    /// Initial value of the `reclaim_mode` control variable.
    #[arg(long, env = "RSWAP_RECLAIM_MODE", default_value_t = 0)]
    pub initial_reclaim_mode: u32,

    /// Address the admin HTTP surface binds to.
    #[arg(long, env = "RSWAP_ADMIN_BIND", default_value = "127.0.0.1:7600")]
    pub admin_bind_address: String,
}

impl RswapConfig {
    /// Builds a [`ControlRegistry`] seeded from this configuration's initial
    /// control-variable overrides; the ten boolean flags always start at
    /// their documented `false` default.
    #[must_use]
    pub fn build_control_registry(&self) -> ControlRegistry {
        let registry = ControlRegistry::new();
        registry.set_var(ControlVar::SthdCnt, self.initial_sthd_cnt);
        registry.set_var(ControlVar::ReclaimMode, self.initial_reclaim_mode);
        registry
    }

    /// Number of remote chunks this configuration implies, per
    /// [`layout::chunk_count`].
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        layout::chunk_count(self.module.rmsize)
    }
}
