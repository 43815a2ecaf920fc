//! # Actor Base
//!
//! An actor is any `Send + Sync` value embedding an [`ActorCore`]: a private
//! FIFO task queue plus a pending-count gate that keeps at most one drain
//! pass per actor in flight on the worker pool.
//!
//! ## Scheduling rule
//! `async_task` enqueues, then increments the pending count. The caller that
//! moves it from 0 to 1 submits one drain job. The drain job runs tasks one
//! by one and decrements after each; it exits exactly on the 1→0 transition.
//! A drain job therefore exists iff the count is non-zero, which gives:
//! - per-actor FIFO execution, whichever worker runs the pass
//! - no two tasks of one actor ever running concurrently
//! - no enqueued task left undrained
//!
//! ## Ownership
//! Every scheduled closure (drain job, timer entry, periodic tick) holds an
//! `Arc` to its actor, so an actor with outstanding work cannot be dropped.
//! Tasks still queued when the last reference goes away are discarded.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::thread;

use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::Task;
use crate::clock;
use crate::error::{DispatchError, panic_message};
use crate::queue::TaskQueue;
use crate::runtime::RuntimeHandle;

/// Process-unique key of an actor (session id, room id, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Random UUID v4 key, for actors without a caller-assigned one.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActorId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ActorId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Scheduling state embedded in every actor.
pub struct ActorCore {
    id: ActorId,

    /// Pending tasks, insertion order = execution order
    tasks: TaskQueue<Task>,

    /// Tasks enqueued and not yet completed; only its 0→1 and 1→0
    /// transitions matter
    pending: AtomicUsize,

    /// Periodic tick interval, 0 = no tick
    recursive_interval_ms: AtomicI64,

    runtime: RuntimeHandle,

    #[cfg(test)]
    drain_gauge: tests::DrainGauge,
}

impl fmt::Debug for ActorCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorCore")
            .field("id", &self.id)
            .field("queued", &self.tasks.len())
            .field("recursive_interval_ms", &self.recursive_interval_ms())
            .finish()
    }
}

impl ActorCore {
    pub fn new(id: impl Into<ActorId>, runtime: RuntimeHandle) -> Self {
        Self {
            id: id.into(),
            tasks: TaskQueue::new(),
            pending: AtomicUsize::new(0),
            recursive_interval_ms: AtomicI64::new(0),
            runtime,
            #[cfg(test)]
            drain_gauge: tests::DrainGauge::default(),
        }
    }

    pub fn id(&self) -> &ActorId {
        &self.id
    }

    pub fn runtime(&self) -> &RuntimeHandle {
        &self.runtime
    }

    /// Tasks waiting in the private queue (advisory snapshot).
    pub fn queued(&self) -> usize {
        self.tasks.len()
    }

    /// Current periodic tick interval; 0 when no tick runs.
    pub fn recursive_interval_ms(&self) -> i64 {
        self.recursive_interval_ms.load(Ordering::Acquire)
    }

    /// One drain pass. Only ever entered through the job submitted on the
    /// 0→1 transition of `pending`.
    fn drain(&self) {
        let span = crate::actor_span!("drain", self.id);
        let _guard = span.enter();

        self.drain_pass();
    }

    /// Runs tasks until `pending` drops to zero or the pool starts stopping.
    ///
    /// Stopping is observed between two tasks. The pass then gives up the
    /// gate for good: `pending` stays non-zero, so no further drain job is
    /// submitted, and whatever is still queued is discarded.
    fn drain_pass(&self) {
        loop {
            let Some(task) = self.tasks.try_dequeue() else {
                // The increment that keeps us here is published after its
                // enqueue, so the task is about to become visible.
                thread::yield_now();
                continue;
            };

            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
                error!(
                    actor = %self.id,
                    panic = %panic_message(payload.as_ref()),
                    "actor task panicked"
                );
            }

            #[cfg(test)]
            self.drain_gauge.finished();

            if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
                break;
            }

            if self.runtime.pool().is_stopping() {
                let discarded = self.tasks.clear();
                debug!(actor = %self.id, discarded, "worker pool stopping, drain pass abandoned");
                break;
            }

            #[cfg(test)]
            self.drain_gauge.resumed();
        }
    }
}

impl Drop for ActorCore {
    fn drop(&mut self) {
        let discarded = self.tasks.clear();
        if discarded > 0 {
            debug!(actor = %self.id, discarded, "actor dropped with queued tasks");
        }
    }
}

/// Base contract of every actor.
pub trait Actor: Send + Sync + 'static {
    /// The embedded scheduling state.
    fn core(&self) -> &ActorCore;

    /// Periodic tick hook, run as one of the actor's own tasks.
    ///
    /// `expected_ms` is the timestamp this tick was due at. The next tick has
    /// already been armed when this runs.
    fn self_event(&self, expected_ms: i64) {
        let _ = expected_ms;
    }
}

/// Domain dispatch of a concrete actor.
///
/// The set of valid events is the closed `Event` enum. The raw path
/// (`event_type` code plus untyped payload) decodes into it first; a code or
/// payload that does not fit is logged and dropped.
pub trait EventDispatch: Actor + Sized {
    type Event: Send + 'static;
    type Payload;

    /// Maps a raw event code and payload onto `Event`.
    fn decode_event(event_type: i32, payload: Self::Payload) -> Result<Self::Event, DispatchError>;

    /// Schedules the handling of `event` on this actor.
    fn send_async_event(self: &Arc<Self>, event: Self::Event);

    fn send_raw_event(self: &Arc<Self>, event_type: i32, payload: Self::Payload) {
        match Self::decode_event(event_type, payload) {
            Ok(event) => self.send_async_event(event),
            Err(err) => warn!(actor = %self.core().id(), error = %err, "event rejected"),
        }
    }
}

/// Scheduling operations available on any shared actor reference.
pub trait ActorExt {
    /// Enqueues `task` on the actor; it runs after every task enqueued
    /// before it and never concurrently with another task of this actor.
    fn async_task<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static;

    /// Runs `task` on the actor once `delay_ms` has elapsed; immediately for
    /// a non-positive delay.
    fn async_task_after<F>(&self, task: F, delay_ms: i64)
    where
        F: FnOnce() + Send + 'static;

    /// Starts (or retunes) the periodic tick.
    ///
    /// The first call arms a tick at `now + interval_ms`; later calls only
    /// change the interval used by the next re-arm.
    fn start_recursive_event(&self, interval_ms: i64);
}

impl<A: Actor + ?Sized> ActorExt for Arc<A> {
    fn async_task<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        enqueue_task(self, Box::new(task));
    }

    fn async_task_after<F>(&self, task: F, delay_ms: i64)
    where
        F: FnOnce() + Send + 'static,
    {
        self.core()
            .runtime()
            .timers()
            .invoke_event(Arc::clone(self), Box::new(task), delay_ms);
    }

    fn start_recursive_event(&self, interval_ms: i64) {
        if interval_ms <= 0 {
            warn!(actor = %self.core().id(), interval_ms, "ignoring non-positive tick interval");
            return;
        }

        let previous = self
            .core()
            .recursive_interval_ms
            .swap(interval_ms, Ordering::AcqRel);
        if previous == 0 {
            let expected_ms = clock::now_ms().saturating_add(interval_ms);
            arm_self_event(Arc::clone(self), expected_ms, interval_ms);
        }
    }
}

/// The gate. Shared by `ActorExt::async_task` and the timer hand-off.
pub(crate) fn enqueue_task<A: Actor + ?Sized>(actor: &Arc<A>, task: Task) {
    let core = actor.core();
    core.tasks.enqueue(task);

    if core.pending.fetch_add(1, Ordering::AcqRel) == 0 {
        #[cfg(test)]
        core.drain_gauge.submitted();

        let actor = Arc::clone(actor);
        core.runtime
            .pool()
            .push_task(Box::new(move || actor.core().drain()));
    }
}

fn arm_self_event<A: Actor + ?Sized>(actor: Arc<A>, expected_ms: i64, delay_ms: i64) {
    let target = Arc::clone(&actor);
    actor.async_task_after(move || fire_self_event(target, expected_ms), delay_ms);
}

fn fire_self_event<A: Actor + ?Sized>(actor: Arc<A>, expected_ms: i64) {
    let interval_ms = actor.core().recursive_interval_ms();
    if interval_ms == 0 {
        return;
    }

    let delay_ms = next_tick_delay(interval_ms, expected_ms, clock::now_ms());
    arm_self_event(
        Arc::clone(&actor),
        expected_ms.saturating_add(interval_ms),
        delay_ms,
    );
    actor.self_event(expected_ms);
}

/// Delay until the tick after one due at `expected_ms`, observed at `now_ms`.
///
/// A late tick shortens the next delay by its lateness so the long-run rate
/// stays at `interval_ms`; an early or punctual tick waits the full interval.
/// A result `<= 0` means the next tick is already due.
pub fn next_tick_delay(interval_ms: i64, expected_ms: i64, now_ms: i64) -> i64 {
    if now_ms > expected_ms {
        interval_ms.saturating_sub(now_ms.saturating_sub(expected_ms))
    } else {
        interval_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Barrier;
    use std::time::{Duration, Instant};

    use crate::{Runtime, RuntimeConfig};

    /// Drain jobs of one actor that are queued in the pool or hold the gate.
    ///
    /// A pass counts itself out before each decrement of `pending` and back
    /// in when it keeps going, so a job submitted right after the gate opens
    /// never overlaps the pass that opened it.
    #[derive(Debug, Default)]
    pub(super) struct DrainGauge {
        outstanding: AtomicUsize,
        peak: AtomicUsize,
        submitted: AtomicUsize,
    }

    impl DrainGauge {
        pub(super) fn submitted(&self) {
            self.submitted.fetch_add(1, Ordering::AcqRel);
            self.resumed();
        }

        pub(super) fn resumed(&self) {
            let outstanding = self.outstanding.fetch_add(1, Ordering::AcqRel) + 1;
            self.peak.fetch_max(outstanding, Ordering::AcqRel);
        }

        pub(super) fn finished(&self) {
            self.outstanding.fetch_sub(1, Ordering::AcqRel);
        }
    }

    struct Subject {
        core: ActorCore,
        ticks: AtomicUsize,
    }

    impl Actor for Subject {
        fn core(&self) -> &ActorCore {
            &self.core
        }

        fn self_event(&self, _expected_ms: i64) {
            self.ticks.fetch_add(1, Ordering::AcqRel);
        }
    }

    fn start_runtime() -> Runtime {
        Runtime::start(
            RuntimeConfig::default()
                .with_pool_size(8)
                .with_idle_sleep(Duration::from_millis(1))
                .with_timer_workers(1)
                .with_tick_interval(Duration::from_millis(5)),
        )
        .unwrap()
    }

    fn subject(runtime: &Runtime) -> Arc<Subject> {
        Arc::new(Subject {
            core: ActorCore::new(ActorId::generate(), runtime.handle()),
            ticks: AtomicUsize::new(0),
        })
    }

    fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        condition()
    }

    #[test]
    fn test_burst_keeps_one_drain_job_outstanding() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 2_000;

        let runtime = start_runtime();
        let actor = subject(&runtime);
        let done = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS));

        let producers: Vec<_> = (0..THREADS)
            .map(|_| {
                let actor = actor.clone();
                let done = done.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..PER_THREAD {
                        let done = done.clone();
                        actor.async_task(move || {
                            done.fetch_add(1, Ordering::AcqRel);
                        });
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        assert!(wait_until(Duration::from_secs(10), || {
            done.load(Ordering::Acquire) == THREADS * PER_THREAD
        }));
        let gauge = &actor.core().drain_gauge;
        assert!(wait_until(Duration::from_secs(2), || {
            gauge.outstanding.load(Ordering::Acquire) == 0
        }));
        assert!(gauge.submitted.load(Ordering::Acquire) >= 1);
        assert_eq!(gauge.peak.load(Ordering::Acquire), 1, "two drain jobs were outstanding at once");
        runtime.shutdown();
    }

    #[test]
    fn test_extreme_delays_and_intervals_do_not_overflow() {
        let runtime = start_runtime();
        let actor = subject(&runtime);
        let ran = Arc::new(AtomicUsize::new(0));

        let marker = ran.clone();
        actor.async_task_after(
            move || {
                marker.fetch_add(1, Ordering::AcqRel);
            },
            i64::MAX,
        );

        actor.start_recursive_event(i64::MAX);
        assert_eq!(actor.core().recursive_interval_ms(), i64::MAX);

        // a tick due at the far end of the clock still re-arms and runs its hook
        fire_self_event(actor.clone(), i64::MAX - 1);
        assert_eq!(actor.ticks.load(Ordering::Acquire), 1);

        assert_eq!(next_tick_delay(i64::MAX, i64::MIN, i64::MAX), 0);
        assert_eq!(ran.load(Ordering::Acquire), 0);
        runtime.shutdown();
    }

    #[test]
    fn test_punctual_and_early_ticks_wait_full_interval() {
        assert_eq!(next_tick_delay(100, 1_000, 1_000), 100);
        assert_eq!(next_tick_delay(100, 1_000, 990), 100);
    }

    #[test]
    fn test_late_tick_shortens_next_delay() {
        assert_eq!(next_tick_delay(100, 1_000, 1_030), 70);
        // a tick later than a whole interval makes the next one due at once
        assert_eq!(next_tick_delay(100, 1_000, 1_150), -50);
    }

    #[test]
    fn test_actor_id_generation_is_unique() {
        let a = ActorId::generate();
        let b = ActorId::generate();
        assert_ne!(a, b);
        assert_eq!(ActorId::from("room-1").as_str(), "room-1");
        assert_eq!(ActorId::from("room-1").to_string(), "room-1");
    }

    proptest! {
        #[test]
        fn prop_next_tick_never_drifts_later(
            interval in 1i64..10_000,
            expected in 0i64..1_000_000,
            lateness in -10_000i64..10_000,
        ) {
            let now = expected + lateness;
            let delay = next_tick_delay(interval, expected, now);
            prop_assert!(delay <= interval);
            if lateness >= 0 {
                // the next tick is aimed exactly at expected + interval
                prop_assert_eq!(now + delay, expected + interval);
            }
        }
    }
}
