// SPDX-License-Identifier: Apache-2.0

//! A bounded single-producer/single-consumer queue that never rejects a
//! push: instead of failing when full, it doubles its backing capacity.
//!
//! This is the staging queue a scheduler thread drains from and a fault
//! handler (or reclaim worker) pushes into. The producer never blocks on
//! the fast path; only the rare enlarge crosses a lock.

use crate::error::RecvError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

struct Inner<T> {
    buf: VecDeque<T>,
    max_cnt: usize,
}

/// A bounded, auto-enlarging SPSC queue.
///
/// The invariant `len() <= max_cnt` always holds; `max_cnt` only ever
/// doubles, never shrinks, matching the original's "enlarge, never shrink"
/// policy for a structure that is sized once and then left alone for the
/// life of the session.
pub struct VQueue<T> {
    inner: Mutex<Inner<T>>,
    cnt: AtomicUsize,
}

impl<T> VQueue<T> {
    /// Creates a queue with the given initial capacity.
    ///
    /// # Panics
    ///
    /// Panics if `initial_capacity` is zero.
    #[must_use]
    pub fn new(initial_capacity: usize) -> Self {
        assert!(initial_capacity > 0, "VQueue capacity must be non-zero");
        Self {
            inner: Mutex::new(Inner {
                buf: VecDeque::with_capacity(initial_capacity),
                max_cnt: initial_capacity,
            }),
            cnt: AtomicUsize::new(0),
        }
    }

    /// Pushes an item, doubling the backing capacity first if the queue is
    /// currently at its limit. Returns `true` if this call triggered an
    /// enlarge.
    pub fn enqueue(&self, item: T) -> bool {
        let mut inner = self.inner.lock();
        let enlarged = if inner.buf.len() >= inner.max_cnt {
            inner.max_cnt *= 2;
            true
        } else {
            false
        };
        inner.buf.push_back(item);
        let _ = self.cnt.fetch_add(1, Ordering::Release);
        enlarged
    }

    /// Pops the oldest item, or [`RecvError::Empty`] if the queue currently
    /// holds nothing.
    ///
    /// Checks the atomic length first so an empty queue never takes the
    /// lock at all.
    pub fn try_dequeue(&self) -> Result<T, RecvError> {
        if self.cnt.load(Ordering::Acquire) == 0 {
            return Err(RecvError::Empty);
        }
        let mut inner = self.inner.lock();
        match inner.buf.pop_front() {
            Some(item) => {
                let _ = self.cnt.fetch_sub(1, Ordering::Release);
                Ok(item)
            }
            None => Err(RecvError::Empty),
        }
    }

    /// Current number of queued items. Lock-free.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cnt.load(Ordering::Acquire)
    }

    /// Returns `true` if the queue currently holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current backing capacity before the next enlarge.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.lock().max_cnt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn preserves_fifo_order() {
        let q = VQueue::new(4);
        for i in 0..4 {
            assert!(!q.enqueue(i));
        }
        for i in 0..4 {
            assert_eq!(q.try_dequeue().unwrap(), i);
        }
        assert_eq!(q.try_dequeue(), Err(RecvError::Empty));
    }

    #[test]
    fn enlarges_on_overflow_without_losing_order() {
        let q = VQueue::new(2);
        assert!(!q.enqueue(1));
        assert!(!q.enqueue(2));
        // queue is now full at capacity 2; this push must enlarge.
        assert!(q.enqueue(3));
        assert_eq!(q.capacity(), 4);
        assert_eq!(q.try_dequeue().unwrap(), 1);
        assert_eq!(q.try_dequeue().unwrap(), 2);
        assert_eq!(q.try_dequeue().unwrap(), 3);
    }

    #[test]
    fn single_producer_single_consumer_across_real_threads() {
        let q = Arc::new(VQueue::new(8));
        let producer_q = q.clone();
        const N: usize = 10_000;

        let producer = thread::spawn(move || {
            for i in 0..N {
                let _ = producer_q.enqueue(i);
            }
        });

        let mut received = Vec::with_capacity(N);
        while received.len() < N {
            match q.try_dequeue() {
                Ok(item) => received.push(item),
                Err(RecvError::Empty) => thread::yield_now(),
            }
        }
        producer.join().unwrap();

        assert_eq!(received, (0..N).collect::<Vec<_>>());
    }
}
