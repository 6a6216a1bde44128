// SPDX-License-Identifier: Apache-2.0

//! Errors raised by chunk addressing and queue submission.

/// Errors returned by [`crate::ChunkTable`] and [`crate::TransportQueue`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The computed chunk index falls outside the table.
    #[error("chunk index {idx} is out of range (table has {len} chunks)")]
    ChunkIndexOutOfRange {
        /// The offending index.
        idx: usize,
        /// The table's length.
        len: usize,
    },

    /// The addressed chunk exists but has never been mapped.
    #[error("chunk {idx} is not mapped")]
    ChunkNotMapped {
        /// The unmapped chunk's index.
        idx: usize,
    },

    /// A queue could not admit a new request even after draining, within
    /// the bounded retry budget.
    #[error("transport queue saturated at depth {depth}")]
    QueueSaturated {
        /// The queue's configured depth.
        depth: usize,
    },
}
