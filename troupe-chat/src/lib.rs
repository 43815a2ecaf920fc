// Troupe Chat
//
// Chat room server actors built on the troupe runtime: rooms own their
// members, users hold a weak reference back to their room, and every state
// change runs as a task of the actor that owns the state.

pub mod config;
pub mod error;
pub mod events;
pub mod registry;
pub mod room;
pub mod service;
pub mod user;

pub use config::ChatConfig;
pub use error::ChatError;
pub use events::{EventData, RoomEvent, UserEvent};
pub use registry::{RoomRegistry, UserRegistry};
pub use room::RoomActor;
pub use service::ChatService;
pub use user::{SessionSink, UserActor};
