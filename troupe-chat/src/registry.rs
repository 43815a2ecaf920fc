//! Key → actor maps shared by all request handlers.
//!
//! Only the maps themselves are serialized here; calls into the actors go
//! through their own task queues.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use rand::seq::IteratorRandom;
use troupe::{ActorExt, ActorId, RuntimeHandle};

use crate::room::RoomActor;
use crate::user::{SessionSink, UserActor};

#[derive(Debug, Default)]
pub struct UserRegistry {
    users: Mutex<HashMap<String, Arc<UserActor>>>,
}

impl UserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn users(&self) -> MutexGuard<'_, HashMap<String, Arc<UserActor>>> {
        self.users.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates the user of `session_id`, replacing any previous one.
    pub fn create(&self, session_id: &str, sink: Weak<dyn SessionSink>, runtime: RuntimeHandle) -> Arc<UserActor> {
        let user = UserActor::new(session_id, sink, runtime);
        self.users().insert(session_id.to_string(), user.clone());
        user
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<UserActor>> {
        self.users().get(session_id).cloned()
    }

    pub fn erase(&self, session_id: &str) -> Option<Arc<UserActor>> {
        self.users().remove(session_id)
    }

    pub fn len(&self) -> usize {
        self.users().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users().is_empty()
    }
}

#[derive(Debug)]
pub struct RoomRegistry {
    rooms: Mutex<HashMap<ActorId, Arc<RoomActor>>>,
    /// Periodic tick of every room created here
    tick_ms: i64,
}

impl RoomRegistry {
    pub fn new(tick_ms: i64) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            tick_ms,
        }
    }

    fn rooms(&self) -> MutexGuard<'_, HashMap<ActorId, Arc<RoomActor>>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates a room, starts its tick and registers it.
    pub fn create(&self, runtime: RuntimeHandle) -> Arc<RoomActor> {
        let room = RoomActor::new(runtime);
        room.start_recursive_event(self.tick_ms);
        self.rooms().insert(room.room_id().clone(), room.clone());
        room
    }

    pub fn get(&self, room_id: &ActorId) -> Option<Arc<RoomActor>> {
        self.rooms().get(room_id).cloned()
    }

    /// Any registered room, picked uniformly.
    pub fn random_room(&self) -> Option<Arc<RoomActor>> {
        self.rooms()
            .values()
            .choose(&mut rand::thread_rng())
            .cloned()
    }

    pub fn erase(&self, room_id: &ActorId) -> Option<Arc<RoomActor>> {
        self.rooms().remove(room_id)
    }

    pub fn len(&self) -> usize {
        self.rooms().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms().is_empty()
    }
}
