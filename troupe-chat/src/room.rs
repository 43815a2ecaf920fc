use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;
use troupe::{Actor, ActorCore, ActorExt, ActorId, DispatchError, EventDispatch, RuntimeHandle};

use crate::events::{EventData, RoomEvent, UserEvent};
use crate::user::UserActor;

/// A chat room. Owns its members; every membership change and broadcast runs
/// as one of the room's own tasks.
pub struct RoomActor {
    core: ActorCore,
    /// Members keyed by session id
    members: Mutex<HashMap<String, Arc<UserActor>>>,
}

impl fmt::Debug for RoomActor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoomActor")
            .field("id", self.core.id())
            .field("members", &self.member_count())
            .finish()
    }
}

impl RoomActor {
    pub fn new(runtime: RuntimeHandle) -> Arc<Self> {
        let id = ActorId::generate();
        troupe::log_lifecycle!("room", id, "created");
        Arc::new(Self {
            core: ActorCore::new(id, runtime),
            members: Mutex::new(HashMap::new()),
        })
    }

    pub fn room_id(&self) -> &ActorId {
        self.core.id()
    }

    /// Current member count (snapshot).
    pub fn member_count(&self) -> usize {
        self.members().len()
    }

    pub fn is_member(&self, session_id: &str) -> bool {
        self.members().contains_key(session_id)
    }

    fn members(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<UserActor>>> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle(&self, event: RoomEvent) {
        match event {
            RoomEvent::EnterRoom(user) => {
                debug!(room = %self.room_id(), session = user.session_id(), "user entered room");
                self.members().insert(user.session_id().to_string(), user);
            }
            RoomEvent::ExitRoom(session_id) => {
                if self.members().remove(&session_id).is_some() {
                    debug!(room = %self.room_id(), session = %session_id, "user left room");
                }
            }
            RoomEvent::Broadcast { sender, message } => {
                // snapshot so member tasks are scheduled without holding the lock
                let members: Vec<_> = self.members().values().cloned().collect();
                for member in members {
                    member.send_async_event(UserEvent::ChatMessage {
                        sender: sender.clone(),
                        message: message.clone(),
                    });
                }
            }
        }
    }
}

impl Actor for RoomActor {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn self_event(&self, expected_ms: i64) {
        debug!(room = %self.room_id(), members = self.member_count(), expected_ms, "room tick");
    }
}

impl EventDispatch for RoomActor {
    type Event = RoomEvent;
    type Payload = EventData;

    fn decode_event(event_type: i32, payload: EventData) -> Result<RoomEvent, DispatchError> {
        RoomEvent::decode(event_type, payload)
    }

    fn send_async_event(self: &Arc<Self>, event: RoomEvent) {
        let room = Arc::clone(self);
        self.async_task(move || room.handle(event));
    }
}

impl Drop for RoomActor {
    fn drop(&mut self) {
        troupe::log_lifecycle!("room", self.core.id(), "dropped");
    }
}
