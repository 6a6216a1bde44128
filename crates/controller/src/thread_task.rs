// SPDX-License-Identifier: Apache-2.0

//! Utilities to run a non-`Send` async task on a dedicated OS thread with a
//! single-threaded Tokio runtime and a `LocalSet`, plus a shutdown signal.
//!
//! Used to host the admin HTTP surface on its own thread, separate from the
//! plain OS threads the scheduler and reclaim workers run on.

use std::future::Future;
use std::thread;
use tokio::{runtime::Builder as RtBuilder, task::LocalSet};
use tokio_util::sync::CancellationToken;

/// Handle to a task running on a dedicated thread.
///
/// - `shutdown()` requests cancellation via the token (idempotent, best-effort).
/// - `shutdown_and_join()` requests shutdown and then waits for completion, returning `crate::Error` on failure.
pub struct ThreadLocalTaskHandle<T, E> {
    cancel_token: CancellationToken,
    join_handle: Option<thread::JoinHandle<Result<T, E>>>,
    name: String,
}

impl<T, E> ThreadLocalTaskHandle<T, E> {
    /// Requests a graceful shutdown by cancelling the token.
    pub fn shutdown(&mut self) {
        self.cancel_token.cancel();
    }

    /// Requests shutdown and then joins, mapping errors into `crate::Error`.
    pub fn shutdown_and_join(self) -> Result<T, crate::Error>
    where
        E: Into<crate::Error>,
    {
        self.shutdown_and_join_internal()
    }

    fn shutdown_and_join_internal(mut self) -> Result<T, crate::Error>
    where
        E: Into<crate::Error>,
    {
        self.shutdown();
        match self.join_handle.take().expect("join handle missing").join() {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(e.into()),
            Err(panic) => Err(crate::Error::ThreadPanicked {
                thread_name: self.name,
                panic_message: format!("{panic:?}"),
            }),
        }
    }
}

/// Spawns a non-`Send` async task on a dedicated OS thread running a
/// single-threaded Tokio runtime with a `LocalSet`. Returns a handle to
/// signal shutdown and join.
///
/// The `task_factory` receives a `CancellationToken` that is cancelled when
/// shutdown is requested and must return the async task to run. The task's
/// `Output` is surfaced by `shutdown_and_join()`.
pub fn spawn_thread_local_task<T, E, Fut, F>(
    thread_name: impl Into<String>,
    task_factory: F,
) -> Result<ThreadLocalTaskHandle<T, E>, crate::Error>
where
    T: Send + 'static,
    E: Send + 'static,
    Fut: 'static + Future<Output = Result<T, E>>,
    F: 'static + Send + FnOnce(CancellationToken) -> Fut,
{
    let name = thread_name.into();
    let name_for_thread = name.clone();
    let token = CancellationToken::new();
    let token_for_task = token.clone();

    let join_handle = thread::Builder::new()
        .name(name_for_thread)
        .spawn(move || {
            let rt = RtBuilder::new_current_thread()
                .enable_all()
                .build()
                .expect("failed to create tokio runtime");
            let local = LocalSet::new();
            let fut = task_factory(token_for_task);
            rt.block_on(local.run_until(fut))
        })
        .map_err(|e| crate::Error::ThreadSpawnFailed {
            thread_name: name.clone(),
            source: e,
        })?;

    Ok(ThreadLocalTaskHandle {
        cancel_token: token,
        join_handle: Some(join_handle),
        name,
    })
}
