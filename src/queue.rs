//! Drop-oldest FIFO queues shared between pipeline workers.
//!
//! Producers never block and never fail a push: when the queue is at
//! capacity, the oldest element is evicted first and handed back to the
//! caller so it can be counted or logged.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// Fixed-capacity FIFO with drop-oldest-on-full semantics.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    capacity: usize,
    items: Mutex<VecDeque<T>>,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    /// Create a queue with a soft cap: the oldest item is evicted once more
    /// than `threshold` items are queued, checked before each push.
    ///
    /// Equivalent to a hard capacity of `threshold + 1`.
    pub fn with_soft_cap(threshold: usize) -> Self {
        Self::new(threshold.saturating_add(1))
    }

    /// Append `item`, evicting and returning the oldest item if full.
    pub fn push(&self, item: T) -> Option<T> {
        let mut items = self.lock();
        let evicted = if items.len() >= self.capacity {
            items.pop_front()
        } else {
            None
        };
        items.push_back(item);
        evicted
    }

    /// Remove and return the oldest item.
    pub fn pop(&self) -> Option<T> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Remove every queued item, oldest first.
    pub fn drain(&self) -> Vec<T> {
        self.lock().drain(..).collect()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        // A panicking holder cannot leave the deque half-updated
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
