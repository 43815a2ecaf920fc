mod common;

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier, Mutex, mpsc};
    use std::thread;
    use std::time::Duration;

    use troupe::{Actor, ActorExt};

    use crate::common::{Recorder, start_runtime, wait_until};

    const THREADS: usize = 8;
    const PER_THREAD: usize = 1_000;

    #[test]
    fn test_single_producer_runs_in_enqueue_order() {
        let runtime = start_runtime(4);
        let actor = Recorder::new(runtime.handle());
        let log = Arc::new(Mutex::new(Vec::new()));

        for seq in 0..500u32 {
            let log = log.clone();
            actor.async_task(move || log.lock().unwrap().push(seq));
        }

        assert!(wait_until(Duration::from_secs(5), || log.lock().unwrap().len() == 500));
        assert_eq!(*log.lock().unwrap(), (0..500).collect::<Vec<_>>());
        runtime.shutdown();
    }

    #[test]
    fn test_concurrent_producers_keep_per_thread_order() {
        let runtime = start_runtime(8);
        let actor = Recorder::new(runtime.handle());
        let log = Arc::new(Mutex::new(Vec::with_capacity(THREADS * PER_THREAD)));
        let barrier = Arc::new(Barrier::new(THREADS));

        let producers: Vec<_> = (0..THREADS)
            .map(|producer| {
                let actor = actor.clone();
                let log = log.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    for seq in 0..PER_THREAD {
                        let log = log.clone();
                        actor.async_task(move || log.lock().unwrap().push((producer, seq)));
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        assert!(wait_until(Duration::from_secs(10), || {
            log.lock().unwrap().len() == THREADS * PER_THREAD
        }));

        let log = log.lock().unwrap();
        let unique: HashSet<_> = log.iter().copied().collect();
        assert_eq!(unique.len(), THREADS * PER_THREAD, "no task lost or run twice");

        let mut next = vec![0usize; THREADS];
        for &(producer, seq) in log.iter() {
            assert_eq!(seq, next[producer], "producer {producer} out of order");
            next[producer] += 1;
        }
        drop(log);
        runtime.shutdown();
    }

    #[test]
    fn test_tasks_of_one_actor_never_overlap() {
        let runtime = start_runtime(8);
        let actor = Recorder::new(runtime.handle());
        let in_task = Arc::new(AtomicBool::new(false));
        let overlaps = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS));

        let producers: Vec<_> = (0..THREADS)
            .map(|_| {
                let actor = actor.clone();
                let in_task = in_task.clone();
                let overlaps = overlaps.clone();
                let done = done.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..PER_THREAD {
                        let in_task = in_task.clone();
                        let overlaps = overlaps.clone();
                        let done = done.clone();
                        actor.async_task(move || {
                            if in_task.swap(true, Ordering::AcqRel) {
                                overlaps.fetch_add(1, Ordering::Relaxed);
                            }
                            std::hint::spin_loop();
                            in_task.store(false, Ordering::Release);
                            done.fetch_add(1, Ordering::Release);
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
        assert_eq!(overlaps.load(Ordering::Relaxed), 0);
        runtime.shutdown();
    }

    #[test]
    fn test_distinct_actors_run_in_parallel() {
        let runtime = start_runtime(4);
        let first = Recorder::new(runtime.handle());
        let second = Recorder::new(runtime.handle());
        let barrier = Arc::new(Barrier::new(2));
        let met = Arc::new(AtomicUsize::new(0));

        for actor in [&first, &second] {
            let barrier = barrier.clone();
            let met = met.clone();
            // both tasks can only pass the barrier if they run at the same time
            actor.async_task(move || {
                barrier.wait();
                met.fetch_add(1, Ordering::Release);
            });
        }

        assert!(wait_until(Duration::from_secs(5), || met.load(Ordering::Acquire) == 2));
        runtime.shutdown();
    }

    #[test]
    fn test_panicking_task_does_not_stall_the_actor() {
        let runtime = start_runtime(2);
        let actor = Recorder::new(runtime.handle());
        let log = Arc::new(Mutex::new(Vec::new()));

        let before = log.clone();
        actor.async_task(move || before.lock().unwrap().push("before"));
        actor.async_task(|| panic!("task failure"));
        let after = log.clone();
        actor.async_task(move || after.lock().unwrap().push("after"));

        assert!(wait_until(Duration::from_secs(5), || log.lock().unwrap().len() == 2));
        assert_eq!(*log.lock().unwrap(), vec!["before", "after"]);

        // the gate reopened: a later task still gets a fresh drain pass
        let late = log.clone();
        actor.async_task(move || late.lock().unwrap().push("late"));
        assert!(wait_until(Duration::from_secs(5), || log.lock().unwrap().len() == 3));
        runtime.shutdown();
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::Release);
        }
    }

    #[test]
    fn test_dropping_actor_discards_undrained_tasks() {
        let runtime = start_runtime(2);
        let actor = Recorder::new(runtime.handle());
        // with the pool stopped the drain job is refused and the task stays queued
        runtime.shutdown();

        let ran = Arc::new(AtomicBool::new(false));
        let released = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(released.clone());
        let marker = ran.clone();
        actor.async_task(move || {
            let _flag = &flag;
            marker.store(true, Ordering::Release);
        });
        assert_eq!(actor.core().queued(), 1);

        drop(actor);
        assert!(released.load(Ordering::Acquire), "queued task dropped with its actor");
        assert!(!ran.load(Ordering::Acquire), "queued task never executed");
    }

    /// Each run enqueues the next one, so the actor's backlog never empties.
    fn spin(actor: &Arc<Recorder>, runs: Arc<AtomicUsize>) {
        let next = actor.clone();
        actor.async_task(move || {
            runs.fetch_add(1, Ordering::Relaxed);
            spin(&next, runs);
        });
    }

    #[test]
    fn test_shutdown_completes_while_an_actor_feeds_itself() {
        let runtime = start_runtime(2);
        let actor = Recorder::new(runtime.handle());
        let weak = Arc::downgrade(&actor);
        let runs = Arc::new(AtomicUsize::new(0));

        spin(&actor, runs.clone());
        drop(actor);
        assert!(wait_until(Duration::from_secs(5), || runs.load(Ordering::Relaxed) > 1_000));

        let (done_tx, done_rx) = mpsc::channel();
        let stopper = thread::spawn(move || {
            runtime.shutdown();
            let _ = done_tx.send(());
        });
        assert!(
            done_rx.recv_timeout(Duration::from_secs(3)).is_ok(),
            "shutdown hung behind a self-feeding actor"
        );
        stopper.join().unwrap();

        let settled = runs.load(Ordering::Relaxed);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(runs.load(Ordering::Relaxed), settled, "no task runs after shutdown");
        assert!(wait_until(Duration::from_secs(2), || weak.upgrade().is_none()));
    }

    #[test]
    fn test_actor_outlives_its_callers_while_work_is_pending() {
        let runtime = start_runtime(2);
        let actor = Recorder::new(runtime.handle());
        let weak = Arc::downgrade(&actor);
        let ran = Arc::new(AtomicBool::new(false));

        let marker = ran.clone();
        actor.async_task_after(move || marker.store(true, Ordering::Release), 50);
        drop(actor);

        assert!(weak.upgrade().is_some(), "timer entry keeps the actor alive");
        assert!(wait_until(Duration::from_secs(5), || ran.load(Ordering::Acquire)));
        assert!(wait_until(Duration::from_secs(5), || weak.upgrade().is_none()));
        runtime.shutdown();
    }
}
