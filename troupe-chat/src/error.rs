//! # Chat Service Error Types
//!
//! Every request handler of [`ChatService`](crate::ChatService) answers with
//! `Result<(), ChatError>`: `Ok` is the success ack, `Err` the error ack the
//! network layer sends back to the session.
//!
//! Failures inside actors (a member that left while a broadcast was in
//! flight, a session already gone) never show up here. They are normal churn
//! and are dropped where they happen.

use thiserror::Error;
use troupe::RuntimeError;

#[derive(Error, Debug)]
pub enum ChatError {
    /// No user actor is registered for this session.
    #[error("No user for session {0}")]
    UserNotFound(String),

    /// There is no room to enter.
    #[error("No room available")]
    RoomNotFound,

    /// The user is not (or no longer) in a room.
    #[error("Session {0} is not in a room")]
    NotInRoom(String),

    /// A required request field is missing or empty.
    #[error("Missing request field: {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
