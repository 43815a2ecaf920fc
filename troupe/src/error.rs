use thiserror::Error;

/// Errors raised while assembling, starting or stopping the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Failed to spawn {component} thread: {source}")]
    ThreadSpawn {
        component: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("Component is already started")]
    AlreadyStarted,
    #[error("Runtime is shutting down")]
    ShuttingDown,
}

/// Errors raised when a concrete actor cannot interpret an inbound event.
///
/// These never escape an actor's dispatch: they are logged and the event is
/// dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Unknown event type: {0}")]
    UnknownEventType(i32),
    #[error("Event type {event_type} expects {expected} payload, got {found}")]
    PayloadMismatch {
        event_type: i32,
        expected: &'static str,
        found: &'static str,
    },
}

/// Best-effort text of a panic payload caught by `catch_unwind`.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
