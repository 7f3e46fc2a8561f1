//! Domain events fanned out to room topics.
//!
//! Every state mutation publishes a [`RoomEvent`] through the
//! [`super::EventBus`]. WebSocket connections subscribe to room topics and
//! receive the events whose [`RoomEvent::room_id`] matches. Membership
//! events carry the refreshed member list so clients never have to
//! reconstruct it from deltas.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ids::{MemberId, QuizId, RoomId, SessionId};

/// One row of the membership list attached to room events.
#[derive(Debug, Clone, Serialize)]
pub struct MemberInfo {
    /// Member identity.
    pub id: MemberId,
    /// Display name resolved through the member directory.
    pub name: String,
    /// Ready flag (owners are implicitly ready and report `false`).
    pub is_ready: bool,
    /// Whether this member owns the room.
    pub is_owner: bool,
    /// Whether this member has submitted for the active round; only
    /// present while a game is running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_submitted: Option<bool>,
}

/// Progress stage of background quiz generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationStatus {
    /// Generation accepted and queued.
    Started,
    /// Generation running.
    InProgress,
    /// Questions stored; the game can start.
    Completed,
    /// Generation failed; no automatic retry.
    Failed,
}

/// Signal attached to a completed round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RoundSignal {
    /// All rounds played; the quiz is over.
    QuizEnd,
    /// More rounds remain; advance to the next question.
    NextQuestion,
}

/// Domain event emitted after every state mutation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum RoomEvent {
    /// A member joined the room.
    MemberJoined {
        /// Room topic.
        room_id: RoomId,
        /// Member who joined.
        member_id: MemberId,
        /// Refreshed membership list.
        members: Vec<MemberInfo>,
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A member left the room.
    MemberLeft {
        /// Room topic.
        room_id: RoomId,
        /// Member who left.
        member_id: MemberId,
        /// Refreshed membership list.
        members: Vec<MemberInfo>,
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A member toggled readiness.
    ReadyChanged {
        /// Room topic.
        room_id: RoomId,
        /// Member whose flag changed.
        member_id: MemberId,
        /// New ready state.
        is_ready: bool,
        /// Refreshed membership list.
        members: Vec<MemberInfo>,
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Ownership transferred after the owner left.
    OwnerChanged {
        /// Room topic.
        room_id: RoomId,
        /// Departing owner.
        previous_owner: MemberId,
        /// Earliest-joined remaining member who inherited the room.
        new_owner: MemberId,
        /// Refreshed membership list.
        members: Vec<MemberInfo>,
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Room settings changed.
    RoomUpdated {
        /// Room topic.
        room_id: RoomId,
        /// Refreshed membership list.
        members: Vec<MemberInfo>,
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A settings change was applied with a caveat (e.g. privacy without
    /// a password fell back to public).
    SettingsWarning {
        /// Room topic.
        room_id: RoomId,
        /// Human-readable warning.
        message: String,
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },

    /// The last member left and the room was removed.
    RoomDeleted {
        /// Room topic.
        room_id: RoomId,
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },

    /// The game started.
    GameStarted {
        /// Room topic.
        room_id: RoomId,
        /// Bound quiz, when generation has completed.
        #[serde(skip_serializing_if = "Option::is_none")]
        quiz_id: Option<QuizId>,
        /// Refreshed membership list.
        members: Vec<MemberInfo>,
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },

    /// The game ended and the room returned to the lobby.
    GameEnded {
        /// Room topic.
        room_id: RoomId,
        /// Refreshed membership list.
        members: Vec<MemberInfo>,
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Background quiz-generation progress.
    GenerationProgress {
        /// Room topic.
        room_id: RoomId,
        /// Stage discriminator.
        status: GenerationStatus,
        /// Progress percentage (0–100).
        progress: u8,
        /// Human-readable progress message.
        message: String,
        /// Bound quiz, present once generation completed.
        #[serde(skip_serializing_if = "Option::is_none")]
        quiz_id: Option<QuizId>,
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Public question payload pushed to all participants. Never carries
    /// the correct answer.
    Question {
        /// Room topic.
        room_id: RoomId,
        /// 0-based round index.
        round_index: u32,
        /// Question text shown to players.
        question_text: String,
        /// Whether this is the final round.
        is_last_question: bool,
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Result of one participant's submission.
    AnswerResult {
        /// Room topic.
        room_id: RoomId,
        /// 1-based round number.
        round_number: u32,
        /// Submitting participant.
        participant_id: MemberId,
        /// Whether the submission matched the answer key.
        is_correct: bool,
        /// The correct answer, revealed with the result.
        correct_answer: String,
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Every registered participant submitted for the active round.
    RoundComplete {
        /// Room topic.
        room_id: RoomId,
        /// 1-based round number that completed.
        round_number: u32,
        /// Whether the quiz ended or the next question should play.
        signal: RoundSignal,
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Room-scoped chat message relay.
    Chat {
        /// Room topic.
        room_id: RoomId,
        /// Sending member.
        sender_id: MemberId,
        /// Sender display name.
        sender_name: String,
        /// Message body.
        content: String,
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A session record expired and was swept.
    SessionExpired {
        /// Identity that owned the session.
        identity: MemberId,
        /// Expired session.
        session_id: SessionId,
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A command failed; the error is scoped to the room topic so other
    /// rooms are unaffected.
    CommandFailed {
        /// Room topic.
        room_id: RoomId,
        /// Command name as received.
        command: String,
        /// Numeric error code (see the error-code table).
        code: u32,
        /// Human-readable error message.
        message: String,
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl RoomEvent {
    /// Returns the room topic this event belongs to, or `None` for
    /// events without a room scope (session sweeps).
    #[must_use]
    pub const fn room_id(&self) -> Option<RoomId> {
        match self {
            Self::MemberJoined { room_id, .. }
            | Self::MemberLeft { room_id, .. }
            | Self::ReadyChanged { room_id, .. }
            | Self::OwnerChanged { room_id, .. }
            | Self::RoomUpdated { room_id, .. }
            | Self::SettingsWarning { room_id, .. }
            | Self::RoomDeleted { room_id, .. }
            | Self::GameStarted { room_id, .. }
            | Self::GameEnded { room_id, .. }
            | Self::GenerationProgress { room_id, .. }
            | Self::Question { room_id, .. }
            | Self::AnswerResult { room_id, .. }
            | Self::RoundComplete { room_id, .. }
            | Self::Chat { room_id, .. }
            | Self::CommandFailed { room_id, .. } => Some(*room_id),
            Self::SessionExpired { .. } => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn events_carry_their_room_topic() {
        let room_id = RoomId::new();
        let event = RoomEvent::RoomDeleted {
            room_id,
            timestamp: Utc::now(),
        };
        assert_eq!(event.room_id(), Some(room_id));
    }

    #[test]
    fn session_events_have_no_room_scope() {
        let event = RoomEvent::SessionExpired {
            identity: MemberId::from("alice"),
            session_id: SessionId::from("ws-1"),
            timestamp: Utc::now(),
        };
        assert_eq!(event.room_id(), None);
    }

    #[test]
    fn serializes_with_event_type_tag() {
        let event = RoomEvent::RoundComplete {
            room_id: RoomId::new(),
            round_number: 3,
            signal: RoundSignal::QuizEnd,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).ok();
        let Some(json) = json else {
            panic!("serialization failed");
        };
        assert_eq!(
            json.get("event_type").and_then(|v| v.as_str()),
            Some("round_complete")
        );
        assert_eq!(json.get("signal").and_then(|v| v.as_str()), Some("quizEnd"));
    }
}
