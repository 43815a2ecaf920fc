use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use troupe::RuntimeConfig;

pub const DEFAULT_ROOM_TICK: Duration = Duration::from_secs(10);

/// Configuration of the chat server.
#[derive(Clone, Debug)]
pub struct ChatConfig {
    /// Runtime the actors are scheduled on.
    pub runtime: RuntimeConfig,

    /// Periodic tick of every room.
    pub room_tick: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            runtime: RuntimeConfig::default(),
            room_tick: DEFAULT_ROOM_TICK,
        }
    }
}

impl ChatConfig {
    /// Defaults, overridden by `TROUPE_POOL_SIZE` and `TROUPE_TIMER_WORKERS`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(pool_size) = env_usize("TROUPE_POOL_SIZE")? {
            config.runtime = config.runtime.with_pool_size(pool_size);
        }
        if let Some(workers) = env_usize("TROUPE_TIMER_WORKERS")? {
            config.runtime = config.runtime.with_timer_workers(workers);
        }
        config.runtime.validate()?;
        Ok(config)
    }

    pub fn room_tick_ms(&self) -> i64 {
        i64::try_from(self.room_tick.as_millis()).unwrap_or(i64::MAX)
    }
}

/// Reads an optional numeric environment variable.
pub fn env_usize(name: &str) -> Result<Option<usize>> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{name} must be a non-negative integer, got {value:?}")),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("cannot read {name}")),
    }
}
