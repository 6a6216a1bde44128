// SPDX-License-Identifier: Apache-2.0

//! Per-(core, traffic class) in-flight accounting for the remote transport.
//!
//! The queue itself does not talk to the fabric; it only tracks how many
//! requests are outstanding and throttles admission once that count gets
//! close to the queue's configured depth, leaving a margin of `16` slots
//! for in-progress completions to drain into.

use crate::Error;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Margin left below `depth` before submission starts backing off, so a
/// burst of completions always has room to land.
const DRAIN_MARGIN: usize = 16;

/// Maximum number of reserve-drain-retry cycles before giving up.
const MAX_RESERVE_ATTEMPTS: u32 = 64;

/// Batch size used when draining completions.
const DRAIN_BATCH: usize = 4;

/// Tracks in-flight request count for one `(core, class)` transport queue.
#[derive(Debug)]
pub struct TransportQueue {
    depth: usize,
    in_flight: AtomicUsize,
}

impl TransportQueue {
    /// Creates a queue with the given depth.
    #[must_use]
    pub fn new(depth: usize) -> Self {
        Self {
            depth,
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Configured depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Current in-flight count.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    fn admission_ceiling(&self) -> usize {
        self.depth.saturating_sub(DRAIN_MARGIN)
    }

    /// Reserves one in-flight slot, optimistically incrementing first and
    /// rolling the increment back if that would exceed `depth - 16`.
    ///
    /// On rollback, drains up to a batch of completions via `poll_batch`
    /// (which should return the number of completions it actually
    /// processed) and retries, up to a bounded number of attempts.
    pub fn reserve(&self, mut poll_batch: impl FnMut() -> usize) -> Result<(), Error> {
        let ceiling = self.admission_ceiling();
        for _ in 0..MAX_RESERVE_ATTEMPTS {
            let prev = self.in_flight.fetch_add(1, Ordering::AcqRel);
            if prev < ceiling {
                return Ok(());
            }
            let _ = self.in_flight.fetch_sub(1, Ordering::AcqRel);
            self.drain_with(&mut poll_batch);
        }
        Err(Error::QueueSaturated { depth: self.depth })
    }

    /// Releases one in-flight slot on completion.
    pub fn release(&self) {
        let _ = self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }

    /// Polls completions in batches of four until `in_flight` reaches zero
    /// or the number of completions processed reaches the pending count
    /// observed at entry, whichever comes first.
    pub fn drain(&self, mut poll_batch: impl FnMut() -> usize) {
        self.drain_with(&mut poll_batch);
    }

    fn drain_with(&self, poll_batch: &mut impl FnMut() -> usize) {
        let pending_at_entry = self.in_flight();
        let mut processed = 0;
        while self.in_flight() > 0 && processed < pending_at_entry {
            processed += poll_batch().min(DRAIN_BATCH);
            if processed == 0 {
                break;
            }
        }
    }

    /// Runs one nonblocking poll batch and returns the resulting in-flight
    /// count, used by the prefetcher to decide whether to wait.
    pub fn peek(&self, mut poll_batch: impl FnMut() -> usize) -> usize {
        let _ = poll_batch();
        self.in_flight()
    }
}
