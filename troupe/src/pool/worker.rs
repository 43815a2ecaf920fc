use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, trace};

use crate::Task;
use crate::error::panic_message;
use crate::queue::TaskQueue;

use super::stats::ExecutionStats;

/// # Pool Worker
///
/// One long-lived OS thread of the worker pool.
///
/// ## Core Algorithm
/// 1. Try to pull a job from the shared queue
/// 2. If one is found, run it and fold its wall-clock time into the pool stats
/// 3. Otherwise sleep for `idle_sleep` (coarse backoff, no busy spin)
/// 4. Repeat until the shutdown flag is observed between two jobs
///
/// A panicking job is caught, logged and counted; the worker keeps running.
pub(crate) struct Worker {
    /// Index of this worker inside the pool
    id: usize,

    /// Queue shared by every worker of the pool
    queue: Arc<TaskQueue<Task>>,

    /// Statistics shared by every worker of the pool
    stats: Arc<Mutex<ExecutionStats>>,

    /// Signal for worker shutdown
    shutdown_flag: Arc<AtomicBool>,

    /// Sleep between two polls of an empty queue
    idle_sleep: Duration,
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("idle_sleep", &self.idle_sleep)
            .finish()
    }
}

impl Worker {
    pub(crate) fn new(
        id: usize,
        queue: Arc<TaskQueue<Task>>,
        stats: Arc<Mutex<ExecutionStats>>,
        shutdown_flag: Arc<AtomicBool>,
        idle_sleep: Duration,
    ) -> Self {
        Self {
            id,
            queue,
            stats,
            shutdown_flag,
            idle_sleep,
        }
    }

    /// Launches the worker loop on a named OS thread.
    pub(crate) fn spawn(self, name: String) -> io::Result<JoinHandle<()>> {
        thread::Builder::new().name(name).spawn(move || self.run_loop())
    }

    fn run_loop(&self) {
        debug!(worker = self.id, "pool worker started");

        while !self.shutdown_flag.load(Ordering::Acquire) {
            match self.queue.try_dequeue() {
                Some(job) => self.execute(job),
                None => thread::sleep(self.idle_sleep),
            }
        }

        debug!(worker = self.id, "pool worker stopped");
    }

    fn execute(&self, job: Task) {
        let started = Instant::now();
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
            error!(
                worker = self.id,
                panic = %panic_message(payload.as_ref()),
                "pool job panicked"
            );
        }
        let elapsed = started.elapsed();
        trace!(worker = self.id, elapsed_us = elapsed.as_micros() as u64, "pool job finished");

        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(elapsed);
    }
}
