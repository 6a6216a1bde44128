// SPDX-License-Identifier: Apache-2.0

//! Errors raised by the scheduler thread.

/// Errors returned while spawning or driving the scheduler.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The underlying OS thread could not be spawned.
    #[error("failed to spawn scheduler thread")]
    ThreadSpawnFailed {
        /// The underlying spawn failure.
        #[source]
        source: std::io::Error,
    },
}
