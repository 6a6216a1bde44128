// SPDX-License-Identifier: Apache-2.0

//! Errors for the bounded queue.

/// Errors that can occur when dequeuing from a [`crate::vqueue::VQueue`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvError {
    /// The queue currently holds nothing.
    #[error("the queue is empty")]
    Empty,
}
