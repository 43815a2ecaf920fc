use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::info;

use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::monitor::Monitor;
use crate::pool::{PoolStatus, WorkerPool};
use crate::timer::TimerManager;

/// Cloneable access to the process-scoped runtime components.
///
/// Actors keep one of these in their [`ActorCore`](crate::ActorCore) instead
/// of reaching for global singletons.
#[derive(Debug, Clone)]
pub struct RuntimeHandle {
    pool: Arc<WorkerPool>,
    timers: Arc<TimerManager>,
}

impl RuntimeHandle {
    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub fn timers(&self) -> &Arc<TimerManager> {
        &self.timers
    }
}

/// Owner of the worker pool and the timer subsystem.
///
/// Built once before any actor exists and shut down once after everything
/// that depends on it has stopped producing work. Dropping the runtime shuts
/// it down.
#[derive(Debug)]
pub struct Runtime {
    config: RuntimeConfig,
    handle: RuntimeHandle,
    is_shut_down: AtomicBool,
}

impl Runtime {
    /// Validates `config`, then starts the worker pool and the timer workers.
    pub fn start(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        config.validate()?;

        let pool = Arc::new(WorkerPool::new(config.pool.clone()));
        let pool_threads = pool.start()?;

        let timers = Arc::new(TimerManager::new(config.timer.clone()));
        let timer_threads = match timers.start() {
            Ok(count) => count,
            Err(err) => {
                pool.stop();
                return Err(err);
            }
        };

        crate::log_scheduler!("runtime", "started", pool_threads, timer_threads);

        Ok(Self {
            config,
            handle: RuntimeHandle { pool, timers },
            is_shut_down: AtomicBool::new(false),
        })
    }

    pub fn handle(&self) -> RuntimeHandle {
        self.handle.clone()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Reads and resets the worker pool statistics.
    pub fn status(&self) -> PoolStatus {
        self.handle.pool.status()
    }

    /// Starts a monitor thread publishing pool status every
    /// `config.monitor_interval`, together with `gauge()` (for instance the
    /// current connection count).
    pub fn spawn_monitor<G>(&self, gauge: G) -> Result<Monitor, RuntimeError>
    where
        G: Fn() -> usize + Send + 'static,
    {
        self.spawn_monitor_every(self.config.monitor_interval, gauge)
    }

    pub fn spawn_monitor_every<G>(&self, interval: Duration, gauge: G) -> Result<Monitor, RuntimeError>
    where
        G: Fn() -> usize + Send + 'static,
    {
        Monitor::spawn(self.handle.pool.clone(), interval, gauge)
    }

    /// Stops the timer subsystem first (no delayed work becomes runnable),
    /// then the worker pool. Pending work is discarded. Idempotent.
    pub fn shutdown(&self) {
        if self.is_shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.handle.timers.stop();
        self.handle.pool.stop();
        info!("runtime shut down");
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.shutdown();
    }
}
