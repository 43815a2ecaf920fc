use std::time::Duration;

use crate::error::RuntimeError;

pub const DEFAULT_TIMER_WORKER_COUNT: usize = 4;
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(10);

// --- Worker Pool ---

/// Configuration for the shared worker pool.
#[derive(Clone, Debug)]
pub struct WorkerPoolConfig {
    /// Number of long-lived worker threads.
    pub pool_size: usize,

    /// How long an idle worker sleeps before polling the queue again.
    pub idle_sleep: Duration,

    /// Prefix for worker thread names (`{prefix}-{index}`).
    pub thread_name_prefix: String,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            pool_size: num_cpus::get(),
            idle_sleep: Duration::from_millis(10),
            thread_name_prefix: "troupe-worker".to_string(),
        }
    }
}

// --- Timer Subsystem ---

/// Configuration for the timer manager and its workers.
#[derive(Clone, Debug)]
pub struct TimerConfig {
    /// Number of timer worker threads.
    pub worker_count: usize,

    /// Sleep between two timer worker ticks. Bounds how late a due entry fires.
    pub tick_interval: Duration,

    /// Prefix for timer thread names (`{prefix}-{index}`).
    pub thread_name_prefix: String,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_TIMER_WORKER_COUNT,
            tick_interval: Duration::from_millis(10),
            thread_name_prefix: "troupe-timer".to_string(),
        }
    }
}

// --- Runtime ---

/// Configuration for the whole runtime.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Worker pool settings.
    pub pool: WorkerPoolConfig,

    /// Timer subsystem settings.
    pub timer: TimerConfig,

    /// Polling interval used by the status monitor.
    pub monitor_interval: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            pool: WorkerPoolConfig::default(),
            timer: TimerConfig::default(),
            monitor_interval: DEFAULT_MONITOR_INTERVAL,
        }
    }
}

impl RuntimeConfig {
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool.pool_size = pool_size;
        self
    }

    pub fn with_idle_sleep(mut self, idle_sleep: Duration) -> Self {
        self.pool.idle_sleep = idle_sleep;
        self
    }

    pub fn with_timer_workers(mut self, worker_count: usize) -> Self {
        self.timer.worker_count = worker_count;
        self
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.timer.tick_interval = tick_interval;
        self
    }

    /// Rejects settings the runtime cannot start with.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.pool.pool_size == 0 {
            return Err(RuntimeError::InvalidConfig(
                "worker pool needs at least one thread".to_string(),
            ));
        }
        if self.timer.worker_count == 0 {
            return Err(RuntimeError::InvalidConfig(
                "timer subsystem needs at least one worker".to_string(),
            ));
        }
        if self.timer.tick_interval.is_zero() {
            return Err(RuntimeError::InvalidConfig(
                "timer tick interval must be non-zero".to_string(),
            ));
        }
        if self.monitor_interval.is_zero() {
            return Err(RuntimeError::InvalidConfig(
                "monitor interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
