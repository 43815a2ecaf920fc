//! # Chat Request Handlers
//!
//! Entry points the network layer calls for each session event or request.
//! Handlers resolve the session's user, validate the request and turn it
//! into events for the room actor; the answer is the ack for the client.

use std::sync::{Arc, Weak};

use tracing::debug;
use troupe::{EventDispatch, Runtime, RuntimeHandle};

use crate::config::ChatConfig;
use crate::error::ChatError;
use crate::events::RoomEvent;
use crate::registry::{RoomRegistry, UserRegistry};
use crate::room::RoomActor;
use crate::user::{SessionSink, UserActor};

#[derive(Debug)]
pub struct ChatService {
    runtime: RuntimeHandle,
    users: UserRegistry,
    rooms: RoomRegistry,
}

impl ChatService {
    pub fn new(runtime: RuntimeHandle, config: &ChatConfig) -> Self {
        Self {
            runtime,
            users: UserRegistry::new(),
            rooms: RoomRegistry::new(config.room_tick_ms()),
        }
    }

    /// Starts a runtime from `config.runtime` and a service bound to it.
    ///
    /// The caller owns the runtime and shuts it down once the service stops
    /// taking requests.
    pub fn start(config: &ChatConfig) -> Result<(Runtime, Self), ChatError> {
        let runtime = Runtime::start(config.runtime.clone())?;
        let service = Self::new(runtime.handle(), config);
        Ok((runtime, service))
    }

    pub fn users(&self) -> &UserRegistry {
        &self.users
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    pub fn create_room(&self) -> Arc<RoomActor> {
        self.rooms.create(self.runtime.clone())
    }

    /// A session connected: it gets a fresh user actor.
    pub fn open_session(&self, session_id: &str, sink: Weak<dyn SessionSink>) -> Arc<UserActor> {
        self.users.create(session_id, sink, self.runtime.clone())
    }

    /// A session disconnected: the user leaves its room and is unregistered.
    pub fn close_session(&self, session_id: &str) -> Result<(), ChatError> {
        let user = self
            .users
            .erase(session_id)
            .ok_or_else(|| ChatError::UserNotFound(session_id.to_string()))?;

        if let Some(room) = user.room() {
            room.send_async_event(RoomEvent::ExitRoom(session_id.to_string()));
        }
        debug!(session = session_id, "session closed");
        Ok(())
    }

    pub fn register(&self, session_id: &str, nickname: &str) -> Result<(), ChatError> {
        let user = self.user(session_id)?;
        let nickname = nickname.trim();
        if nickname.is_empty() {
            return Err(ChatError::MissingField("nickname"));
        }
        user.set_nickname(nickname);
        Ok(())
    }

    /// Puts the user into a random room.
    pub fn enter_room(&self, session_id: &str) -> Result<Arc<RoomActor>, ChatError> {
        let user = self.user(session_id)?;
        let room = self.rooms.random_room().ok_or(ChatError::RoomNotFound)?;

        room.send_async_event(RoomEvent::EnterRoom(user.clone()));
        user.set_room(&room);
        Ok(room)
    }

    pub fn exit_room(&self, session_id: &str) -> Result<(), ChatError> {
        let user = self.user(session_id)?;
        let room = user
            .room()
            .ok_or_else(|| ChatError::NotInRoom(session_id.to_string()))?;

        room.send_async_event(RoomEvent::ExitRoom(session_id.to_string()));
        user.clear_room();
        Ok(())
    }

    /// Broadcasts `message` under the user's nickname to the user's room.
    pub fn send_chat(&self, session_id: &str, message: &str) -> Result<(), ChatError> {
        let user = self.user(session_id)?;
        if message.is_empty() {
            return Err(ChatError::MissingField("chat_message"));
        }
        let room = user
            .room()
            .ok_or_else(|| ChatError::NotInRoom(session_id.to_string()))?;

        room.send_async_event(RoomEvent::Broadcast {
            sender: user.nickname(),
            message: message.to_string(),
        });
        Ok(())
    }

    /// Open sessions, the gauge published next to the pool status.
    pub fn session_count(&self) -> usize {
        self.users.len()
    }

    fn user(&self, session_id: &str) -> Result<Arc<UserActor>, ChatError> {
        self.users
            .get(session_id)
            .ok_or_else(|| ChatError::UserNotFound(session_id.to_string()))
    }
}
