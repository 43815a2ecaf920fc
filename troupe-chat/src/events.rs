//! Event vocabulary of the chat actors.
//!
//! The network layer speaks in raw `(code, payload)` pairs; each actor
//! decodes them into its own closed event enum before anything is scheduled.

use std::sync::Arc;

use troupe::DispatchError;

use crate::user::UserActor;

/// Untyped payload carried by a raw event.
#[derive(Debug, Clone)]
pub enum EventData {
    Member(Arc<UserActor>),
    Session(String),
    Chat { sender: String, message: String },
}

impl EventData {
    fn shape(&self) -> &'static str {
        match self {
            EventData::Member(_) => "member",
            EventData::Session(_) => "session",
            EventData::Chat { .. } => "chat",
        }
    }
}

fn mismatch(event_type: i32, expected: &'static str, data: &EventData) -> DispatchError {
    DispatchError::PayloadMismatch {
        event_type,
        expected,
        found: data.shape(),
    }
}

/// Events understood by a [`RoomActor`](crate::RoomActor).
#[derive(Debug, Clone)]
pub enum RoomEvent {
    EnterRoom(Arc<UserActor>),
    ExitRoom(String),
    Broadcast { sender: String, message: String },
}

impl RoomEvent {
    pub const ENTER_ROOM: i32 = 1;
    pub const EXIT_ROOM: i32 = 2;
    pub const BROADCAST: i32 = 3;

    pub fn code(&self) -> i32 {
        match self {
            RoomEvent::EnterRoom(_) => Self::ENTER_ROOM,
            RoomEvent::ExitRoom(_) => Self::EXIT_ROOM,
            RoomEvent::Broadcast { .. } => Self::BROADCAST,
        }
    }

    pub fn decode(event_type: i32, data: EventData) -> Result<Self, DispatchError> {
        match (event_type, data) {
            (Self::ENTER_ROOM, EventData::Member(user)) => Ok(RoomEvent::EnterRoom(user)),
            (Self::EXIT_ROOM, EventData::Session(session_id)) => Ok(RoomEvent::ExitRoom(session_id)),
            (Self::BROADCAST, EventData::Chat { sender, message }) => {
                Ok(RoomEvent::Broadcast { sender, message })
            }
            (Self::ENTER_ROOM, data) => Err(mismatch(event_type, "member", &data)),
            (Self::EXIT_ROOM, data) => Err(mismatch(event_type, "session", &data)),
            (Self::BROADCAST, data) => Err(mismatch(event_type, "chat", &data)),
            (unknown, _) => Err(DispatchError::UnknownEventType(unknown)),
        }
    }
}

/// Events understood by a [`UserActor`](crate::UserActor).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserEvent {
    ChatMessage { sender: String, message: String },
}

impl UserEvent {
    pub const CHAT_MESSAGE: i32 = 1;

    pub fn code(&self) -> i32 {
        match self {
            UserEvent::ChatMessage { .. } => Self::CHAT_MESSAGE,
        }
    }

    pub fn decode(event_type: i32, data: EventData) -> Result<Self, DispatchError> {
        match (event_type, data) {
            (Self::CHAT_MESSAGE, EventData::Chat { sender, message }) => {
                Ok(UserEvent::ChatMessage { sender, message })
            }
            (Self::CHAT_MESSAGE, data) => Err(mismatch(event_type, "chat", &data)),
            (unknown, _) => Err(DispatchError::UnknownEventType(unknown)),
        }
    }
}
