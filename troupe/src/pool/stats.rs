use std::time::Duration;

/// Rolling per-job execution statistics shared by all pool workers.
///
/// Guarded by a single mutex in the pool; both `record` and `take` are
/// constant-time so the lock is only ever held briefly.
#[derive(Debug, Default)]
pub(crate) struct ExecutionStats {
    processed: u64,
    max: Duration,
    min: Option<Duration>,
    avg_ms: f64,
}

impl ExecutionStats {
    /// Folds one job's wall-clock execution time into the counters.
    pub(crate) fn record(&mut self, elapsed: Duration) {
        self.processed += 1;
        self.max = self.max.max(elapsed);
        self.min = Some(match self.min {
            Some(min) => min.min(elapsed),
            None => elapsed,
        });

        // incremental mean: avg_n = avg_{n-1} * (n-1)/n + x/n
        let n = self.processed as f64;
        let elapsed_ms = elapsed.as_secs_f64() * 1_000.0;
        self.avg_ms = self.avg_ms * ((n - 1.0) / n) + elapsed_ms / n;
    }

    /// Returns the current counters and resets them.
    pub(crate) fn take(&mut self) -> ExecutionStats {
        std::mem::take(self)
    }
}

/// Immutable snapshot returned by [`WorkerPool::status`](super::WorkerPool::status).
///
/// `processed`, `max_execution`, `min_execution` and `avg_execution_ms` cover
/// the jobs finished since the previous snapshot; `running_time` and
/// `backlog` are live reads.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolStatus {
    /// Time since the pool was created.
    pub running_time: Duration,

    /// Jobs finished since the previous snapshot.
    pub processed: u64,

    /// Longest job since the previous snapshot.
    pub max_execution: Duration,

    /// Shortest job since the previous snapshot; `None` if no job finished.
    pub min_execution: Option<Duration>,

    /// Mean job time in milliseconds since the previous snapshot.
    pub avg_execution_ms: f64,

    /// Jobs currently waiting in the shared queue.
    pub backlog: usize,
}

impl PoolStatus {
    pub(crate) fn new(running_time: Duration, stats: ExecutionStats, backlog: usize) -> Self {
        Self {
            running_time,
            processed: stats.processed,
            max_execution: stats.max,
            min_execution: stats.min,
            avg_execution_ms: stats.avg_ms,
            backlog,
        }
    }
}
