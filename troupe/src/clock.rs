//! Wall-clock helpers for the timer subsystem.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
///
/// Timer due timestamps and periodic-tick expectations live in this domain.
pub fn now_ms() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_millis() as i64,
        // clock set before 1970
        Err(err) => -(err.duration().as_millis() as i64),
    }
}
