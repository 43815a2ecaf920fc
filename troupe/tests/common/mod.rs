#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use troupe::{Actor, ActorCore, Runtime, RuntimeConfig, RuntimeHandle, clock};

pub const TICK: Duration = Duration::from_millis(5);

/// Scheduling slack tolerated on top of a timer tick on loaded CI machines.
pub const SLACK_MS: i64 = 150;

/// Runtime with short sleeps so timing assertions stay tight.
pub fn start_runtime(pool_size: usize) -> Runtime {
    start_runtime_with(pool_size, 2)
}

pub fn start_runtime_with(pool_size: usize, timer_workers: usize) -> Runtime {
    troupe::logging::init_test();
    let config = RuntimeConfig::default()
        .with_pool_size(pool_size)
        .with_idle_sleep(Duration::from_millis(1))
        .with_timer_workers(timer_workers)
        .with_tick_interval(TICK);
    Runtime::start(config).expect("runtime should start")
}

/// Polls `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(2));
    }
}

/// Minimal actor recording its periodic ticks as `(expected_ms, fired_ms)`.
pub struct Recorder {
    core: ActorCore,
    ticks: Mutex<Vec<(i64, i64)>>,
    slow_tick: Option<(usize, Duration)>,
}

impl Recorder {
    pub fn new(runtime: RuntimeHandle) -> Arc<Self> {
        Self::with_slow_tick(runtime, None)
    }

    /// The tick with index `slow_tick.0` sleeps for `slow_tick.1`.
    pub fn with_slow_tick(runtime: RuntimeHandle, slow_tick: Option<(usize, Duration)>) -> Arc<Self> {
        Arc::new(Self {
            core: ActorCore::new(troupe::ActorId::generate(), runtime),
            ticks: Mutex::new(Vec::new()),
            slow_tick,
        })
    }

    pub fn ticks(&self) -> Vec<(i64, i64)> {
        self.ticks.lock().unwrap().clone()
    }
}

impl Actor for Recorder {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn self_event(&self, expected_ms: i64) {
        let index = {
            let mut ticks = self.ticks.lock().unwrap();
            ticks.push((expected_ms, clock::now_ms()));
            ticks.len() - 1
        };
        if let Some((slow_index, pause)) = self.slow_tick {
            if index == slow_index {
                thread::sleep(pause);
            }
        }
    }
}
