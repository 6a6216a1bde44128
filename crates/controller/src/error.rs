// SPDX-License-Identifier: Apache-2.0

//! Errors for the controller crate.

use miette::Diagnostic;

/// Errors that can occur while starting, running, or stopping the top-level
/// module handle.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum Error {
    /// Failed to enumerate available CPU cores on this platform.
    #[error("failed to get available CPU cores (core detection unavailable on this platform)")]
    CoreDetectionUnavailable,

    /// Fewer cores are available than the configuration requires.
    #[error("requested {requested} cores but only {available} are available")]
    NotEnoughCores {
        /// Cores requested by the configuration.
        requested: usize,
        /// Cores actually detected on this host.
        available: usize,
    },

    /// Tenant registration or lookup failed.
    #[error("tenant registry error: {0}")]
    Tenant(#[from] rswap_tenant::Error),

    /// Chunk table or request-queue admission failed.
    #[error("transport error: {0}")]
    Transport(#[from] rswap_transport::Error),

    /// Scheduler thread management failed.
    #[error("scheduler error: {0}")]
    Scheduler(#[from] rswap_scheduler::Error),

    /// Reclaim worker pool management failed.
    #[error("reclaim controller error: {0}")]
    Reclaim(#[from] rswap_reclaim::Error),

    /// The admin HTTP surface failed to start or encountered a fatal error.
    #[error("admin surface error: {0}")]
    Admin(#[from] rswap_admin::error::Error),

    /// Failed to spawn a dedicated OS thread for a subsystem task.
    #[error("failed to spawn thread '{thread_name}': {source}")]
    ThreadSpawnFailed {
        /// Name of the thread that failed to spawn.
        thread_name: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// A dedicated subsystem thread panicked instead of returning.
    #[error("thread '{thread_name}' panicked: {panic_message}")]
    ThreadPanicked {
        /// Name of the thread that panicked.
        thread_name: String,
        /// Captured panic payload, formatted for display.
        panic_message: String,
    },
}
