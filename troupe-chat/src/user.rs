use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use tracing::trace;
use troupe::{Actor, ActorCore, ActorExt, DispatchError, EventDispatch, RuntimeHandle};

use crate::events::{EventData, UserEvent};
use crate::room::RoomActor;

/// Outbound side of a client session, implemented by the network layer.
pub trait SessionSink: Send + Sync {
    /// Delivers a chat line broadcast by `sender`.
    fn deliver(&self, sender: &str, message: &str);
}

/// One connected chat user, keyed by its session id.
///
/// The room it sits in is only referenced weakly: the room owns its members,
/// and a user must cope with its room being gone. The session sink is weak
/// too, a closed session simply stops receiving.
pub struct UserActor {
    core: ActorCore,
    session_id: String,
    nickname: RwLock<String>,
    room: Mutex<Weak<RoomActor>>,
    sink: Weak<dyn SessionSink>,
}

impl fmt::Debug for UserActor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserActor")
            .field("session_id", &self.session_id)
            .field("nickname", &self.nickname())
            .finish()
    }
}

impl UserActor {
    pub fn new(session_id: impl Into<String>, sink: Weak<dyn SessionSink>, runtime: RuntimeHandle) -> Arc<Self> {
        let session_id = session_id.into();
        troupe::log_lifecycle!("user", session_id, "created");
        Arc::new(Self {
            core: ActorCore::new(session_id.as_str(), runtime),
            session_id,
            nickname: RwLock::new(String::new()),
            room: Mutex::new(Weak::new()),
            sink,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn nickname(&self) -> String {
        self.nickname
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_nickname(&self, nickname: impl Into<String>) {
        *self.nickname.write().unwrap_or_else(PoisonError::into_inner) = nickname.into();
    }

    /// The room this user is in, if it still exists.
    pub fn room(&self) -> Option<Arc<RoomActor>> {
        self.room
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .upgrade()
    }

    pub fn set_room(&self, room: &Arc<RoomActor>) {
        *self.room.lock().unwrap_or_else(PoisonError::into_inner) = Arc::downgrade(room);
    }

    pub fn clear_room(&self) {
        *self.room.lock().unwrap_or_else(PoisonError::into_inner) = Weak::new();
    }

    fn handle(&self, event: UserEvent) {
        match event {
            UserEvent::ChatMessage { sender, message } => {
                // a user does not get its own lines echoed back
                if sender == self.nickname() {
                    return;
                }
                match self.sink.upgrade() {
                    Some(sink) => sink.deliver(&sender, &message),
                    None => trace!(session = %self.session_id, "session gone, chat line dropped"),
                }
            }
        }
    }
}

impl Actor for UserActor {
    fn core(&self) -> &ActorCore {
        &self.core
    }
}

impl EventDispatch for UserActor {
    type Event = UserEvent;
    type Payload = EventData;

    fn decode_event(event_type: i32, payload: EventData) -> Result<UserEvent, DispatchError> {
        UserEvent::decode(event_type, payload)
    }

    fn send_async_event(self: &Arc<Self>, event: UserEvent) {
        let user = Arc::clone(self);
        self.async_task(move || user.handle(event));
    }
}

impl Drop for UserActor {
    fn drop(&mut self) {
        troupe::log_lifecycle!("user", self.session_id, "dropped");
    }
}
