// SPDX-License-Identifier: Apache-2.0

//! A single page-level remote I/O request and the completion policy that
//! governs what happens to its page once the fabric reports back.

use rswap_tenant::TrafficClass;

/// DMA direction implied by a traffic class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Page contents move from local memory to the remote chunk.
    ToRemote,
    /// Page contents move from the remote chunk into local memory.
    FromRemote,
}

impl Direction {
    /// The direction implied by a traffic class: stores write out, both
    /// load classes read in.
    #[must_use]
    pub fn for_class(class: TrafficClass) -> Self {
        match class {
            TrafficClass::Store => Self::ToRemote,
            TrafficClass::LoadSync | TrafficClass::LoadAsync => Self::FromRemote,
        }
    }
}

/// A resolved, ready-to-post page-level request.
#[derive(Debug, Clone, Copy)]
pub struct TransportRequest {
    /// Core the request originated from.
    pub core: usize,
    /// Chunk index the request targets.
    pub chunk_idx: usize,
    /// Byte offset of the page within its chunk.
    pub offset_in_chunk: u64,
    /// Traffic class this request belongs to.
    pub class: TrafficClass,
}

impl TransportRequest {
    /// DMA direction for this request.
    #[must_use]
    pub fn direction(&self) -> Direction {
        Direction::for_class(self.class)
    }
}

/// What the completion callback must do to the page once a request
/// finishes, and whether it succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// Unlock the page immediately; no content-freshness change implied
    /// (the store path releases the writeback waiter).
    Unlock,
    /// Mark the page up to date and unlock it.
    MarkUpToDateAndUnlock,
    /// Mark the page up to date but leave it locked for an explicit later
    /// drain/unlock (the lazy-poll policy).
    MarkUpToDateKeepLocked,
    /// The request failed; leave the page locked so a higher layer can
    /// retry or kill the faulter.
    LeaveLockedOnFailure,
}

/// Computes the completion policy for a finished request.
///
/// `lazy_poll` only affects the `LoadSync` class: when enabled, a
/// synchronous load leaves its page locked for an explicit drain instead of
/// unlocking inline.
#[must_use]
pub fn completion_policy(class: TrafficClass, succeeded: bool, lazy_poll: bool) -> PageOutcome {
    if !succeeded {
        return PageOutcome::LeaveLockedOnFailure;
    }
    match class {
        TrafficClass::Store => PageOutcome::Unlock,
        TrafficClass::LoadSync if lazy_poll => PageOutcome::MarkUpToDateKeepLocked,
        TrafficClass::LoadSync | TrafficClass::LoadAsync => PageOutcome::MarkUpToDateAndUnlock,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_always_unlocks_regardless_of_lazy_poll() {
        assert_eq!(
            completion_policy(TrafficClass::Store, true, false),
            PageOutcome::Unlock
        );
        assert_eq!(
            completion_policy(TrafficClass::Store, true, true),
            PageOutcome::Unlock
        );
    }

    #[test]
    fn load_sync_respects_lazy_poll() {
        assert_eq!(
            completion_policy(TrafficClass::LoadSync, true, false),
            PageOutcome::MarkUpToDateAndUnlock
        );
        assert_eq!(
            completion_policy(TrafficClass::LoadSync, true, true),
            PageOutcome::MarkUpToDateKeepLocked
        );
    }

    #[test]
    fn load_async_always_unlocks() {
        assert_eq!(
            completion_policy(TrafficClass::LoadAsync, true, true),
            PageOutcome::MarkUpToDateAndUnlock
        );
    }

    #[test]
    fn failure_always_leaves_page_locked() {
        assert_eq!(
            completion_policy(TrafficClass::Store, false, false),
            PageOutcome::LeaveLockedOnFailure
        );
        assert_eq!(
            completion_policy(TrafficClass::LoadAsync, false, true),
            PageOutcome::LeaveLockedOnFailure
        );
    }

    #[test]
    fn direction_follows_class() {
        assert_eq!(Direction::for_class(TrafficClass::Store), Direction::ToRemote);
        assert_eq!(
            Direction::for_class(TrafficClass::LoadSync),
            Direction::FromRemote
        );
        assert_eq!(
            Direction::for_class(TrafficClass::LoadAsync),
            Direction::FromRemote
        );
    }
}
