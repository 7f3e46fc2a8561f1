//! # quizroom-gateway
//!
//! REST API and WebSocket gateway coordinating multiplayer quiz rooms.
//!
//! The gateway owns the real-time coordination core — the room lifecycle
//! state machine, distributed session dedup, and per-round submission
//! bookkeeping — while identity, member profiles, and quiz-content
//! generation are delegated to external collaborators behind traits. All
//! cross-instance state lives in a shared keyed store; in-process state
//! is never authoritative.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Dispatcher (ws/)
//!     │
//!     ├── RoomService / SessionService / QuizService (service/)
//!     ├── EventBus (domain/)
//!     │
//!     ├── Room aggregate + events (domain/)
//!     ├── External collaborators (external/)
//!     │
//!     └── SharedStore (store/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod external;
pub mod service;
pub mod store;
pub mod ws;
