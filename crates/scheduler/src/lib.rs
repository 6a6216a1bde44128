// SPDX-License-Identifier: Apache-2.0

//! A weighted-fair scheduler that drains per-core submission queues onto
//! the remote transport, one pinned OS thread per scheduler instance.

pub mod algorithm;
pub mod error;
pub mod thread;
pub mod vqlist;

pub use algorithm::{poll_class, poll_idle_cores};
pub use error::Error;
pub use thread::{Dispatcher, SchedulerThread};
pub use vqlist::VqList;
