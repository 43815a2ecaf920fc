//! # Worker Pool Module
//!
//! A fixed set of long-lived OS threads draining one shared job queue.
//!
//! ## Key Concepts
//! - Multiplexing: any number of actors share a small, fixed thread count
//! - Drain jobs: actors submit one job per empty→non-empty transition of
//!   their private queue; the pool does not know about actors otherwise
//! - Health monitoring: per-job timing statistics read through [`WorkerPool::status`]
//!
//! ## Thread Safety
//! - The job queue is lock-free
//! - Statistics live behind one short-held mutex, also used by the
//!   read-and-reset in `status`

mod stats;
mod worker;

pub use stats::PoolStatus;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::Task;
use crate::config::WorkerPoolConfig;
use crate::error::RuntimeError;
use crate::queue::TaskQueue;

use self::stats::ExecutionStats;
use self::worker::Worker;

/// Lifecycle of a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Created, no worker spawned yet. Jobs are queued but not run.
    Initializing = 0,

    /// Workers are running
    Running = 1,

    /// `stop` has been called and workers are being joined
    ShuttingDown = 2,

    /// All workers joined, queue discarded
    Shutdown = 3,
}

impl PoolState {
    fn from_usize(value: usize) -> Self {
        match value {
            0 => PoolState::Initializing,
            1 => PoolState::Running,
            2 => PoolState::ShuttingDown,
            _ => PoolState::Shutdown,
        }
    }
}

/// Shared worker pool executing drain jobs.
///
/// # Worker Thread Behavior
/// 1. Gets a job from the shared queue
/// 2. Runs it, timing it for the statistics
/// 3. Sleeps briefly when the queue is empty
/// 4. Exits at the first job boundary after `stop`
///
/// Jobs pushed after `stop` began are dropped without running.
pub struct WorkerPool {
    config: WorkerPoolConfig,

    /// Central job queue
    queue: Arc<TaskQueue<Task>>,

    /// Rolling execution statistics
    stats: Arc<Mutex<ExecutionStats>>,

    /// Shutdown flag observed by every worker
    is_shutting_down: Arc<AtomicBool>,

    /// Current [`PoolState`]
    state: AtomicUsize,

    /// Join handles of the spawned workers
    workers: Mutex<Vec<JoinHandle<()>>>,

    /// Creation instant, base of `PoolStatus::running_time`
    created_at: Instant,
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("pool_size", &self.config.pool_size)
            .field("state", &self.state())
            .field("backlog", &self.queue.len())
            .finish()
    }
}

impl WorkerPool {
    /// Creates a pool without spawning any thread.
    pub fn new(config: WorkerPoolConfig) -> Self {
        Self {
            config,
            queue: Arc::new(TaskQueue::new()),
            stats: Arc::new(Mutex::new(ExecutionStats::default())),
            is_shutting_down: Arc::new(AtomicBool::new(false)),
            state: AtomicUsize::new(PoolState::Initializing as usize),
            workers: Mutex::new(Vec::new()),
            created_at: Instant::now(),
        }
    }

    /// Spawns `pool_size` worker threads and returns how many started.
    ///
    /// Failing to spawn the first thread is fatal. A failure after that is
    /// logged and the pool keeps the threads it already has.
    pub fn start(&self) -> Result<usize, RuntimeError> {
        if self
            .state
            .compare_exchange(
                PoolState::Initializing as usize,
                PoolState::Running as usize,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return match self.state() {
                PoolState::Running => Err(RuntimeError::AlreadyStarted),
                _ => Err(RuntimeError::ShuttingDown),
            };
        }

        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        for worker_id in 0..self.config.pool_size {
            let worker = Worker::new(
                worker_id,
                self.queue.clone(),
                self.stats.clone(),
                self.is_shutting_down.clone(),
                self.config.idle_sleep,
            );

            let name = format!("{}-{}", self.config.thread_name_prefix, worker_id);
            match worker.spawn(name) {
                Ok(handle) => workers.push(handle),
                Err(source) if workers.is_empty() => {
                    self.state.store(PoolState::Initializing as usize, Ordering::Release);
                    return Err(RuntimeError::ThreadSpawn {
                        component: "worker pool",
                        source,
                    });
                }
                Err(err) => {
                    warn!(
                        spawned = workers.len(),
                        requested = self.config.pool_size,
                        error = %err,
                        "worker pool running with fewer threads than requested"
                    );
                    break;
                }
            }
        }

        info!(threads = workers.len(), "worker pool started");
        Ok(workers.len())
    }

    /// Enqueues a job for any worker to pick up.
    ///
    /// Jobs pushed before `start` wait in the queue; jobs pushed once
    /// shutdown began are dropped.
    pub fn push_task(&self, job: Task) {
        if self.is_shutting_down.load(Ordering::SeqCst) {
            debug!("worker pool is stopping, job discarded");
            return;
        }
        self.queue.enqueue(job);

        // `stop` may have cleared the queue between the check and the
        // enqueue; nobody polls it any more, so clear it again here.
        if self.is_shutting_down.load(Ordering::SeqCst) {
            let discarded = self.queue.clear();
            debug!(discarded, "worker pool stopped during push, jobs discarded");
        }
    }

    /// Signals every worker to finish its current job, joins them and
    /// discards whatever is still queued. Idempotent.
    pub fn stop(&self) {
        self.is_shutting_down.store(true, Ordering::SeqCst);
        if self.state() == PoolState::Shutdown {
            return;
        }
        self.state.store(PoolState::ShuttingDown as usize, Ordering::Release);

        let handles: Vec<_> = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        let current = thread::current().id();
        for handle in handles {
            if handle.thread().id() == current {
                warn!("worker pool stopped from one of its own workers; not joining it");
                continue;
            }
            if handle.join().is_err() {
                warn!("worker pool thread terminated abnormally");
            }
        }

        let discarded = self.queue.clear();
        if discarded > 0 {
            debug!(discarded, "worker pool discarded queued jobs on stop");
        }

        self.state.store(PoolState::Shutdown as usize, Ordering::Release);
        info!("worker pool stopped");
    }

    /// Reads and resets the execution counters.
    ///
    /// `running_time` and `backlog` are live values and are not reset.
    pub fn status(&self) -> PoolStatus {
        let stats = self
            .stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        PoolStatus::new(self.created_at.elapsed(), stats, self.queue.len())
    }

    /// Number of worker threads requested by the configuration.
    pub fn pool_size(&self) -> usize {
        self.config.pool_size
    }

    /// Jobs currently waiting in the shared queue (snapshot).
    pub fn backlog(&self) -> usize {
        self.queue.len()
    }

    /// Whether `stop` has been called. Drain passes check this between tasks.
    pub fn is_stopping(&self) -> bool {
        self.is_shutting_down.load(Ordering::Acquire)
    }

    pub fn state(&self) -> PoolState {
        PoolState::from_usize(self.state.load(Ordering::Acquire))
    }
}
