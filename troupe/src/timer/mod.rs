//! # Timer Subsystem
//!
//! Converts "run this task against this actor at/after T" requests into
//! ordinary actor tasks once T has elapsed.
//!
//! ## Key Concepts
//! - The [`TimerManager`] timestamps requests and buffers them in one shared
//!   inbound queue
//! - A fixed set of timer workers drain that queue into private buckets and
//!   hand due entries back to the actor's immediate `async_task`
//!
//! ## Guarantees
//! - No entry runs before its due timestamp; it runs at the first worker tick
//!   at or after it
//! - No entry is lost or run twice: an entry belongs to exactly one worker
//!   once it leaves the inbound queue
//! - Entries still buffered when the manager stops are dropped, never run

mod worker;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, trace, warn};

use crate::Task;
use crate::actor::{Actor, enqueue_task};
use crate::clock;
use crate::config::TimerConfig;
use crate::error::RuntimeError;
use crate::queue::TaskQueue;

pub(crate) use self::worker::TimerEntry;
use self::worker::TimerWorker;

/// Owner of the timer workers and of their shared inbound queue.
pub struct TimerManager {
    config: TimerConfig,

    /// Requests not yet picked up by a worker
    inbound: Arc<TaskQueue<TimerEntry>>,

    /// Shutdown flag observed by every timer worker
    is_shutting_down: Arc<AtomicBool>,

    started: AtomicBool,

    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl fmt::Debug for TimerManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerManager")
            .field("worker_count", &self.config.worker_count)
            .field("tick_interval", &self.config.tick_interval)
            .field("inbound", &self.inbound.len())
            .field("is_shutting_down", &self.is_shutting_down.load(Ordering::Relaxed))
            .finish()
    }
}

impl TimerManager {
    /// Creates a manager without spawning any worker.
    pub fn new(config: TimerConfig) -> Self {
        Self {
            config,
            inbound: Arc::new(TaskQueue::new()),
            is_shutting_down: Arc::new(AtomicBool::new(false)),
            started: AtomicBool::new(false),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Spawns the configured number of timer workers.
    pub fn start(&self) -> Result<usize, RuntimeError> {
        if self.is_shutting_down.load(Ordering::Acquire) {
            return Err(RuntimeError::ShuttingDown);
        }
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(RuntimeError::AlreadyStarted);
        }

        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        for worker_id in 0..self.config.worker_count {
            let worker = TimerWorker::new(
                worker_id,
                self.inbound.clone(),
                self.is_shutting_down.clone(),
                self.config.tick_interval,
            );
            let name = format!("{}-{}", self.config.thread_name_prefix, worker_id);
            match worker.spawn(name) {
                Ok(handle) => workers.push(handle),
                Err(source) if workers.is_empty() => {
                    self.started.store(false, Ordering::Release);
                    return Err(RuntimeError::ThreadSpawn {
                        component: "timer",
                        source,
                    });
                }
                Err(err) => {
                    warn!(
                        spawned = workers.len(),
                        requested = self.config.worker_count,
                        error = %err,
                        "timer subsystem running with fewer workers than requested"
                    );
                    break;
                }
            }
        }

        info!(
            workers = workers.len(),
            tick_ms = self.config.tick_interval.as_millis() as u64,
            "timer subsystem started"
        );
        Ok(workers.len())
    }

    /// Runs `task` on `actor` once `delay_ms` has elapsed.
    ///
    /// A non-positive delay hands the task to the actor immediately.
    /// Otherwise the request is timestamped (`now + delay_ms`) and buffered
    /// until a worker finds it due. The pending request keeps `actor` alive.
    pub fn invoke_event<A>(&self, actor: Arc<A>, task: Task, delay_ms: i64)
    where
        A: Actor + ?Sized,
    {
        if delay_ms <= 0 {
            enqueue_task(&actor, task);
            return;
        }
        if self.is_shutting_down.load(Ordering::SeqCst) {
            debug!(target_actor = %actor.core().id(), "timer subsystem stopping, request discarded");
            return;
        }

        let target = actor.core().id().clone();
        let due_ms = clock::now_ms().saturating_add(delay_ms);
        let entry = TimerEntry::new(
            target,
            due_ms,
            Box::new(move || enqueue_task(&actor, task)),
        );
        trace!(due_ms = entry.due_ms(), delay_ms, "timer request buffered");
        self.inbound.enqueue(entry);

        // lost the race against `stop`; the entry holds the actor alive
        if self.is_shutting_down.load(Ordering::SeqCst) {
            let discarded = self.inbound.clear();
            debug!(discarded, "timer subsystem stopped during request, entries discarded");
        }
    }

    /// Stops every timer worker at the end of its current tick, joins them
    /// and drops all buffered requests. Idempotent.
    pub fn stop(&self) {
        if self.is_shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }

        let handles: Vec<_> = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        let current = thread::current().id();
        for handle in handles {
            if handle.thread().id() == current {
                warn!("timer subsystem stopped from one of its own workers; not joining it");
                continue;
            }
            if handle.join().is_err() {
                warn!("timer worker terminated abnormally");
            }
        }

        let discarded = self.inbound.clear();
        info!(discarded, "timer subsystem stopped");
    }

    /// Requests not yet collected by a worker (snapshot).
    pub fn inbound_len(&self) -> usize {
        self.inbound.len()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.is_shutting_down.load(Ordering::Acquire)
    }
}
