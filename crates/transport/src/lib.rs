// SPDX-License-Identifier: Apache-2.0

//! Chunk-addressed remote page transport: a static chunk table, per-queue
//! in-flight accounting with backoff, and the completion policy a page
//! fault or reclaim path applies once a request finishes.

pub mod chunk;
pub mod error;
pub mod queue;
pub mod request;

pub use chunk::{ChunkState, ChunkTable, RemoteChunk};
pub use error::Error;
pub use queue::TransportQueue;
pub use request::{completion_policy, Direction, PageOutcome, TransportRequest};
