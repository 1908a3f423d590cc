use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::datapoint::MetricDatapoint;

/// Default capacity of a freshly swapped-in queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// A batch queue of pending metric data points.
///
/// Producers append to the live sequence under an exclusive lock, and the flusher periodically swaps the live
/// sequence out for a fresh, empty one. The swapped-out sequence is handed to the caller by value, so once drained, it
/// can never be touched by producers again.
///
/// The queue is unbounded: if producers outpace the flush interval, it grows until the next drain.
#[derive(Debug)]
pub struct MetricBatchQueue {
    capacity: usize,
    live: Mutex<Vec<MetricDatapoint>>,
}

impl MetricBatchQueue {
    /// Creates a new `MetricBatchQueue` with the default initial capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Creates a new `MetricBatchQueue` with the given initial capacity.
    ///
    /// Every sequence swapped in by [`drain_and_swap`][Self::drain_and_swap] is pre-sized to the same capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            live: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    // A producer panicking mid-append can't leave the vector in an invalid state, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Vec<MetricDatapoint>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends the given data points to the live sequence.
    pub fn enqueue<I>(&self, points: I)
    where
        I: IntoIterator<Item = MetricDatapoint>,
    {
        let mut live = self.lock();
        live.extend(points);
    }

    /// Swaps the live sequence for a new, empty one and returns the old one.
    ///
    /// Every point enqueued before the swap is in the returned batch, in the order it was enqueued, and no point
    /// enqueued after the swap is.
    pub fn drain_and_swap(&self) -> Vec<MetricDatapoint> {
        let fresh = Vec::with_capacity(self.capacity);
        let mut live = self.lock();
        std::mem::replace(&mut *live, fresh)
    }

    /// Returns the number of data points currently pending.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if no data points are pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MetricBatchQueue {
    fn default() -> Self {
        Self::new()
    }
}
