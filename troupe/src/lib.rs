// Troupe Actor Runtime
//
// This crate provides a small concurrent actor-execution runtime: actors
// with private FIFO task queues multiplexed onto a fixed pool of OS threads,
// plus a timer subsystem for delayed and periodic actor tasks.

pub mod actor;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod pool;
pub mod queue;
pub mod runtime;
pub mod timer;

/// A unit of work: a one-shot closure run at most once.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

// Re-export commonly used types
pub use actor::{Actor, ActorCore, ActorExt, ActorId, EventDispatch, next_tick_delay};
pub use config::{RuntimeConfig, TimerConfig, WorkerPoolConfig};
pub use error::{DispatchError, RuntimeError};
pub use monitor::{Monitor, MonitorReport};
pub use pool::{PoolState, PoolStatus, WorkerPool};
pub use queue::TaskQueue;
pub use runtime::{Runtime, RuntimeHandle};
pub use timer::TimerManager;
