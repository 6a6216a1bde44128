// SPDX-License-Identifier: Apache-2.0

//! Errors raised by the reclamation controller.

/// Errors returned while spawning or driving reclaim workers.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A worker's OS thread could not be spawned.
    #[error("failed to spawn reclaim worker {id}")]
    WorkerSpawnFailed {
        /// The worker slot id that failed to spawn.
        id: usize,
        /// The underlying spawn failure.
        #[source]
        source: std::io::Error,
    },

    /// More workers were requested than the controller can hold.
    #[error("requested {requested} worker slots, maximum is {max}")]
    TooManyWorkers {
        /// The number requested.
        requested: usize,
        /// The hard ceiling, `HMT_MAX_NR_STHDS`.
        max: usize,
    },
}
