// SPDX-License-Identifier: Apache-2.0

//! Bounded queue primitives used between fault handlers, reclaim workers,
//! and the scheduler thread that drains them.

pub mod error;
pub mod vqueue;

pub use error::RecvError;
pub use vqueue::VQueue;
