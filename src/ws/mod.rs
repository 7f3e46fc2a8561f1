//! WebSocket layer: handshake, connection loop, and command dispatch.

pub mod connection;
pub mod dispatcher;
pub mod handler;
pub mod messages;
pub mod subscription;

pub use dispatcher::{ConnectionContext, Dispatcher};
pub use messages::{WsCommand, WsMessage, WsMessageType};
pub use subscription::SubscriptionManager;
