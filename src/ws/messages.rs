//! WebSocket message types: envelope and the declarative command set.
//!
//! [`WsCommand`] is the command table of the dispatcher: each variant
//! couples a command name with its typed payload, so decoding and
//! validation happen once at the boundary instead of ad hoc in every
//! handler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::RoomId;

/// Top-level WebSocket message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    /// Client-provided ID for requests; server-generated for events.
    pub id: String,
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: WsMessageType,
    /// ISO-8601 timestamp.
    pub timestamp: DateTime<Utc>,
    /// Variant-specific payload.
    pub payload: serde_json::Value,
}

/// Discriminator for WebSocket message types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WsMessageType {
    /// Client → Server command.
    Command,
    /// Server → Client response to a command.
    Response,
    /// Server → Client broadcast event.
    Event,
    /// Server → Client error.
    Error,
}

/// Commands a client can send over WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WsCommand {
    /// Subscribe to events for specific rooms. Use `["*"]` for all rooms.
    Subscribe {
        /// Room IDs to subscribe to.
        room_ids: Vec<String>,
    },
    /// Unsubscribe from events for specific rooms.
    Unsubscribe {
        /// Room IDs to unsubscribe from.
        room_ids: Vec<String>,
    },
    /// Join a room.
    JoinRoom {
        /// Target room.
        room_id: RoomId,
        /// Password for private rooms.
        #[serde(default)]
        password: Option<String>,
    },
    /// Leave a room.
    LeaveRoom {
        /// Target room.
        room_id: RoomId,
    },
    /// Toggle the caller's ready flag.
    ToggleReady {
        /// Target room.
        room_id: RoomId,
    },
    /// Start the game (owner only).
    StartGame {
        /// Target room.
        room_id: RoomId,
    },
    /// End the game and return the room to the lobby.
    EndGame {
        /// Target room.
        room_id: RoomId,
    },
    /// Kick off background quiz generation for a room.
    GenerateQuiz {
        /// Target room.
        room_id: RoomId,
    },
    /// Claim the game-start broadcast and push the first question.
    BroadcastGameStart {
        /// Target room.
        room_id: RoomId,
    },
    /// Submit an answer for the active round.
    SubmitAnswer {
        /// Target room.
        room_id: RoomId,
        /// 1-based round number being answered.
        round_number: u32,
        /// Submitted answer text.
        answer: String,
    },
    /// Advance to and push the next question.
    NextQuestion {
        /// Target room.
        room_id: RoomId,
        /// 0-based index of the question just played.
        #[serde(default)]
        question_index: Option<u32>,
        /// Explicit next index, overriding `question_index + 1`.
        #[serde(default)]
        next_question_index: Option<u32>,
    },
    /// Re-push the active question (reconnect catch-up).
    RequestQuestion {
        /// Target room.
        room_id: RoomId,
    },
    /// Room-scoped chat message.
    Chat {
        /// Target room.
        room_id: RoomId,
        /// Message body.
        content: String,
    },
    /// Extend the caller's session TTL.
    RefreshSession,
    /// Keep only this connection: mark the identity's other sessions for
    /// termination (explicit "log in here" action).
    TerminateOtherSessions,
}

impl WsCommand {
    /// Command name as it appears on the wire; used for error events.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Subscribe { .. } => "subscribe",
            Self::Unsubscribe { .. } => "unsubscribe",
            Self::JoinRoom { .. } => "join_room",
            Self::LeaveRoom { .. } => "leave_room",
            Self::ToggleReady { .. } => "toggle_ready",
            Self::StartGame { .. } => "start_game",
            Self::EndGame { .. } => "end_game",
            Self::GenerateQuiz { .. } => "generate_quiz",
            Self::BroadcastGameStart { .. } => "broadcast_game_start",
            Self::SubmitAnswer { .. } => "submit_answer",
            Self::NextQuestion { .. } => "next_question",
            Self::RequestQuestion { .. } => "request_question",
            Self::Chat { .. } => "chat",
            Self::RefreshSession => "refresh_session",
            Self::TerminateOtherSessions => "terminate_other_sessions",
        }
    }

    /// The room this command targets, when it has one.
    #[must_use]
    pub const fn room_id(&self) -> Option<RoomId> {
        match self {
            Self::JoinRoom { room_id, .. }
            | Self::LeaveRoom { room_id }
            | Self::ToggleReady { room_id }
            | Self::StartGame { room_id }
            | Self::EndGame { room_id }
            | Self::GenerateQuiz { room_id }
            | Self::BroadcastGameStart { room_id }
            | Self::SubmitAnswer { room_id, .. }
            | Self::NextQuestion { room_id, .. }
            | Self::RequestQuestion { room_id }
            | Self::Chat { room_id, .. } => Some(*room_id),
            Self::Subscribe { .. }
            | Self::Unsubscribe { .. }
            | Self::RefreshSession
            | Self::TerminateOtherSessions => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn commands_decode_from_tagged_json() {
        let room_id = RoomId::new();
        let json = serde_json::json!({
            "command": "submit_answer",
            "room_id": room_id,
            "round_number": 2,
            "answer": "b",
        });
        let command: Result<WsCommand, _> = serde_json::from_value(json);
        let Ok(command) = command else {
            panic!("decode failed");
        };
        assert_eq!(command.name(), "submit_answer");
        assert_eq!(command.room_id(), Some(room_id));
    }

    #[test]
    fn unknown_command_is_a_decode_error() {
        let json = serde_json::json!({"command": "fly_to_the_moon"});
        let command: Result<WsCommand, _> = serde_json::from_value(json);
        assert!(command.is_err());
    }

    #[test]
    fn optional_fields_default() {
        let room_id = RoomId::new();
        let json = serde_json::json!({"command": "join_room", "room_id": room_id});
        let command: Result<WsCommand, _> = serde_json::from_value(json);
        let Ok(WsCommand::JoinRoom { password, .. }) = command else {
            panic!("decode failed");
        };
        assert!(password.is_none());
    }

    #[test]
    fn refresh_session_has_no_room_scope() {
        let json = serde_json::json!({"command": "refresh_session"});
        let command: Result<WsCommand, _> = serde_json::from_value(json);
        let Ok(command) = command else {
            panic!("decode failed");
        };
        assert_eq!(command.room_id(), None);
    }
}
