//! Domain layer: identifiers, the room aggregate, and the event system.
//!
//! This module contains the server-side domain model: typed identifiers,
//! the [`Room`] aggregate with its lifecycle state machine, the
//! [`RoomEvent`] inventory, and the [`EventBus`] that fans events out to
//! WebSocket connections.

pub mod event_bus;
pub mod ids;
pub mod room;
pub mod room_event;

pub use event_bus::EventBus;
pub use ids::{MemberId, QuizId, RoomId, SessionId};
pub use room::{Room, RoomSettings, RoomStatus, RoomUpdate};
pub use room_event::{MemberInfo, RoomEvent};
