//! Periodic publication of worker pool health.
//!
//! The pool's `status()` is the only health signal the runtime offers; the
//! monitor polls it on a fixed interval and logs a [`MonitorReport`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::error::RuntimeError;
use crate::pool::{PoolStatus, WorkerPool};

/// One published sample.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorReport {
    pub running_time: Duration,
    pub processed: u64,
    /// Jobs per second over the sampling interval
    pub throughput: f64,
    pub max_execution: Duration,
    pub min_execution: Option<Duration>,
    pub avg_execution_ms: f64,
    pub backlog: usize,
    /// Externally tracked value, e.g. the connection count
    pub gauge: usize,
}

impl MonitorReport {
    pub fn from_status(status: &PoolStatus, interval: Duration, gauge: usize) -> Self {
        let seconds = interval.as_secs_f64();
        let throughput = if seconds > 0.0 {
            status.processed as f64 / seconds
        } else {
            0.0
        };

        Self {
            running_time: status.running_time,
            processed: status.processed,
            throughput,
            max_execution: status.max_execution,
            min_execution: status.min_execution,
            avg_execution_ms: status.avg_execution_ms,
            backlog: status.backlog,
            gauge,
        }
    }
}

impl fmt::Display for MonitorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "running {}s | processed {} ({:.1}/s) | exec max {}ms min {} avg {:.3}ms | backlog {} | gauge {}",
            self.running_time.as_secs(),
            self.processed,
            self.throughput,
            self.max_execution.as_millis(),
            match self.min_execution {
                Some(min) => format!("{}ms", min.as_millis()),
                None => "-".to_string(),
            },
            self.avg_execution_ms,
            self.backlog,
            self.gauge,
        )
    }
}

/// Background thread publishing a [`MonitorReport`] every interval.
#[derive(Debug)]
pub struct Monitor {
    shutdown_flag: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Monitor {
    pub fn spawn<G>(pool: Arc<WorkerPool>, interval: Duration, gauge: G) -> Result<Self, RuntimeError>
    where
        G: Fn() -> usize + Send + 'static,
    {
        if interval.is_zero() {
            return Err(RuntimeError::InvalidConfig(
                "monitor interval must be non-zero".to_string(),
            ));
        }

        let shutdown_flag = Arc::new(AtomicBool::new(false));
        let flag = shutdown_flag.clone();
        let handle = thread::Builder::new()
            .name("troupe-monitor".to_string())
            .spawn(move || {
                let mut next = Instant::now() + interval;
                while !flag.load(Ordering::Acquire) {
                    let now = Instant::now();
                    if now < next {
                        thread::park_timeout(next - now);
                        continue;
                    }
                    next += interval;

                    let report = MonitorReport::from_status(&pool.status(), interval, gauge());
                    info!(
                        running_secs = report.running_time.as_secs(),
                        processed = report.processed,
                        throughput = report.throughput,
                        max_ms = report.max_execution.as_millis() as u64,
                        avg_ms = report.avg_execution_ms,
                        backlog = report.backlog,
                        gauge = report.gauge,
                        "{report}"
                    );
                }
            })
            .map_err(|source| RuntimeError::ThreadSpawn {
                component: "monitor",
                source,
            })?;

        Ok(Self {
            shutdown_flag,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Stops the monitor thread and waits for it. Idempotent.
    pub fn stop(&self) {
        self.shutdown_flag.store(true, Ordering::Release);
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.thread().unpark();
            if handle.join().is_err() {
                warn!("monitor thread terminated abnormally");
            }
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop();
    }
}
