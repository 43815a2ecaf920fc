use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_queue::SegQueue;

/// A multi-producer, multi-consumer FIFO used by every part of the runtime.
///
/// The TaskQueue backs the worker pool's job queue, each actor's private
/// task queue and the timer manager's inbound buffer. It wraps a lock-free
/// `SegQueue` and keeps an auxiliary element counter for monitoring.
///
/// # Thread Safety
/// - Safe for any number of concurrent producers and consumers
/// - Concurrent `enqueue`/`try_dequeue` pairs never lose or duplicate an item
///
/// # Advisory reads
/// `len` and `is_empty` are snapshots. They are meant for diagnostics and
/// never for control decisions: a concurrent `enqueue` may race either call.
pub struct TaskQueue<T> {
    /// Lock-free queue holding the items
    queue: SegQueue<T>,

    /// Approximate number of items, updated after each push/pop
    count: AtomicUsize,
}

impl<T> TaskQueue<T> {
    /// Creates an empty queue
    pub fn new() -> Self {
        Self {
            queue: SegQueue::new(),
            count: AtomicUsize::new(0),
        }
    }

    /// Appends an item at the tail of the queue.
    pub fn enqueue(&self, item: T) {
        self.queue.push(item);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Removes the oldest item, or returns `None` if the queue is empty.
    pub fn try_dequeue(&self) -> Option<T> {
        let item = self.queue.pop()?;
        self.count.fetch_sub(1, Ordering::Relaxed);
        Some(item)
    }

    /// Approximate number of queued items.
    ///
    /// The counter is updated after the underlying push/pop, so under
    /// concurrent mutation it may briefly lag behind (and, between a pop and
    /// its decrement racing a push and its increment, wrap). Saturate
    /// anything implausible to zero.
    pub fn len(&self) -> usize {
        let count = self.count.load(Ordering::Relaxed);
        if count > isize::MAX as usize {
            0
        } else {
            count
        }
    }

    /// Whether the queue currently holds no items (snapshot).
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Pops and drops every queued item, returning how many were discarded.
    pub fn clear(&self) -> usize {
        let mut discarded = 0;
        while self.try_dequeue().is_some() {
            discarded += 1;
        }
        discarded
    }
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for TaskQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("len", &self.len())
            .finish()
    }
}
