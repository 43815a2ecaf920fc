use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, trace};

use crate::actor::ActorId;
use crate::clock;
use crate::error::panic_message;
use crate::queue::TaskQueue;

/// A buffered request to hand a task to an actor no earlier than `due_ms`.
///
/// `dispatch` already captures a strong reference to the target actor, so the
/// actor stays alive while the entry is outstanding. Dropping the entry
/// (shutdown) releases that reference without running anything.
pub(crate) struct TimerEntry {
    target: ActorId,
    due_ms: i64,
    dispatch: Box<dyn FnOnce() + Send + 'static>,
}

impl TimerEntry {
    pub(crate) fn new(
        target: ActorId,
        due_ms: i64,
        dispatch: Box<dyn FnOnce() + Send + 'static>,
    ) -> Self {
        Self {
            target,
            due_ms,
            dispatch,
        }
    }

    pub(crate) fn due_ms(&self) -> i64 {
        self.due_ms
    }
}

impl fmt::Debug for TimerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerEntry")
            .field("target", &self.target)
            .field("due_ms", &self.due_ms)
            .finish()
    }
}

/// # Timer Worker
///
/// Each tick:
/// 1. Drains the manager's inbound queue completely into a private map of
///    buckets keyed by due timestamp (arrival order kept inside a bucket)
/// 2. Hands every entry of every bucket with key `<= now` to its actor
/// 3. Drops the processed buckets
///
/// An entry pulled from the inbound queue belongs to this worker from then
/// on; nothing is shared with sibling workers afterwards.
pub(crate) struct TimerWorker {
    id: usize,
    inbound: Arc<TaskQueue<TimerEntry>>,
    shutdown_flag: Arc<AtomicBool>,
    tick_interval: Duration,
    buckets: BTreeMap<i64, VecDeque<TimerEntry>>,
}

impl TimerWorker {
    pub(crate) fn new(
        id: usize,
        inbound: Arc<TaskQueue<TimerEntry>>,
        shutdown_flag: Arc<AtomicBool>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            id,
            inbound,
            shutdown_flag,
            tick_interval,
            buckets: BTreeMap::new(),
        }
    }

    pub(crate) fn spawn(mut self, name: String) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(name)
            .spawn(move || self.run_loop())
    }

    fn run_loop(&mut self) {
        debug!(worker = self.id, "timer worker started");

        while !self.shutdown_flag.load(Ordering::Acquire) {
            self.collect_pending();
            self.tick(clock::now_ms());
            thread::sleep(self.tick_interval);
        }

        let discarded = self.pending();
        self.buckets.clear();
        debug!(worker = self.id, discarded, "timer worker stopped");
    }

    /// Moves every inbound entry into its due-time bucket.
    pub(crate) fn collect_pending(&mut self) -> usize {
        let mut collected = 0;
        while let Some(entry) = self.inbound.try_dequeue() {
            self.buckets.entry(entry.due_ms).or_default().push_back(entry);
            collected += 1;
        }
        collected
    }

    /// Dispatches every bucket due at `now_ms` and returns how many entries
    /// were handed off.
    pub(crate) fn tick(&mut self, now_ms: i64) -> usize {
        let not_due = self.buckets.split_off(&now_ms.saturating_add(1));
        let due = std::mem::replace(&mut self.buckets, not_due);

        let mut fired = 0;
        for (due_ms, bucket) in due {
            for entry in bucket {
                if self.shutdown_flag.load(Ordering::Acquire) {
                    trace!(target_actor = %entry.target, "timer stopping, entry discarded");
                    continue;
                }
                trace!(
                    worker = self.id,
                    target_actor = %entry.target,
                    late_ms = now_ms - due_ms,
                    "timer entry due"
                );
                let target = entry.target;
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(entry.dispatch)) {
                    error!(
                        worker = self.id,
                        target_actor = %target,
                        panic = %panic_message(payload.as_ref()),
                        "timer dispatch panicked"
                    );
                }
                fired += 1;
            }
        }
        fired
    }

    /// Entries held in private buckets.
    pub(crate) fn pending(&self) -> usize {
        self.buckets.values().map(VecDeque::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn worker_with(inbound: Arc<TaskQueue<TimerEntry>>) -> TimerWorker {
        TimerWorker::new(
            0,
            inbound,
            Arc::new(AtomicBool::new(false)),
            Duration::from_millis(10),
        )
    }

    fn recording_entry(log: &Arc<Mutex<Vec<u32>>>, due_ms: i64, tag: u32) -> TimerEntry {
        let log = log.clone();
        TimerEntry::new(
            ActorId::new("recorder"),
            due_ms,
            Box::new(move || log.lock().unwrap().push(tag)),
        )
    }

    #[test]
    fn test_entries_never_fire_before_due() {
        let inbound = Arc::new(TaskQueue::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        inbound.enqueue(recording_entry(&log, 1_000, 1));

        let mut worker = worker_with(inbound);
        assert_eq!(worker.collect_pending(), 1);
        assert_eq!(worker.tick(999), 0);
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(worker.pending(), 1);

        assert_eq!(worker.tick(1_000), 1);
        assert_eq!(*log.lock().unwrap(), vec![1]);
        assert_eq!(worker.pending(), 0, "processed bucket removed");
    }

    #[test]
    fn test_same_due_time_keeps_arrival_order() {
        let inbound = Arc::new(TaskQueue::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        for tag in 0..10 {
            inbound.enqueue(recording_entry(&log, 500, tag));
        }

        let mut worker = worker_with(inbound);
        worker.collect_pending();
        assert_eq!(worker.tick(600), 10);
        assert_eq!(*log.lock().unwrap(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_only_due_buckets_are_processed() {
        let inbound = Arc::new(TaskQueue::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        inbound.enqueue(recording_entry(&log, 300, 3));
        inbound.enqueue(recording_entry(&log, 100, 1));
        inbound.enqueue(recording_entry(&log, 200, 2));

        let mut worker = worker_with(inbound);
        worker.collect_pending();
        assert_eq!(worker.tick(250), 2);
        assert_eq!(*log.lock().unwrap(), vec![1, 2]);
        assert_eq!(worker.pending(), 1);
    }

    #[test]
    fn test_panicking_dispatch_does_not_stop_the_tick() {
        let inbound = Arc::new(TaskQueue::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        inbound.enqueue(TimerEntry::new(
            ActorId::new("faulty"),
            10,
            Box::new(|| panic!("boom")),
        ));
        inbound.enqueue(recording_entry(&log, 10, 7));

        let mut worker = worker_with(inbound);
        worker.collect_pending();
        assert_eq!(worker.tick(10), 2);
        assert_eq!(*log.lock().unwrap(), vec![7]);
    }

    #[test]
    fn test_stopping_worker_discards_due_entries() {
        let inbound = Arc::new(TaskQueue::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        inbound.enqueue(recording_entry(&log, 10, 1));

        let shutdown = Arc::new(AtomicBool::new(false));
        let mut worker = TimerWorker::new(0, inbound, shutdown.clone(), Duration::from_millis(10));
        worker.collect_pending();
        shutdown.store(true, Ordering::Release);
        assert_eq!(worker.tick(10), 0);
        assert!(log.lock().unwrap().is_empty());
    }
}
