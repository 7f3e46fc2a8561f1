//! Service layer: the three coordinators behind the dispatcher.
//!
//! Each service is a stateless orchestrator over the shared store and the
//! event bus: [`RoomService`] owns the room lifecycle, [`SessionService`]
//! the distributed session registry, and [`QuizService`] the per-round
//! submission bookkeeping. Every mutation follows the same pattern:
//! read state → mutate → write (CAS where the entity is versioned) →
//! emit events → return result.

pub mod quiz_service;
pub mod room_service;
pub mod session_service;

pub use quiz_service::{QuizService, SubmitResult};
pub use room_service::RoomService;
pub use session_service::{SessionRecord, SessionService};

use crate::domain::{MemberId, QuizId, RoomId, SessionId};

/// Shared-store key layout. Every key is entity-scoped so a failure while
/// writing one entity can never corrupt another.
pub(crate) mod keys {
    use super::{MemberId, QuizId, RoomId, SessionId};

    /// Set of all active room ids backing the lobby listing.
    pub const ROOMS_INDEX: &str = "rooms:index";

    /// Versioned room aggregate.
    pub fn room(id: RoomId) -> String {
        format!("room:{id}")
    }

    /// Room → quiz binding for the current game.
    pub fn room_quiz(id: RoomId) -> String {
        format!("room:{id}:quizId")
    }

    /// Guard against duplicate game-start broadcasts.
    pub fn room_game_status(id: RoomId) -> String {
        format!("room:{id}:gameStatus")
    }

    /// Session record.
    pub fn session(id: &SessionId) -> String {
        format!("session:{id}")
    }

    /// Per-identity index: hash of session id → last-active epoch ms.
    pub fn session_index(identity: &MemberId) -> String {
        format!("session-index:{identity}")
    }

    /// Prefix for scanning all session indices.
    pub const SESSION_INDEX_PREFIX: &str = "session-index:";

    /// Marked-for-termination pointer to the superseding session.
    pub fn session_terminate(id: &SessionId) -> String {
        format!("session:{id}:terminate")
    }

    /// Ordered list of correct answers.
    pub fn quiz_answer_key(id: QuizId) -> String {
        format!("quiz:{id}:answerKey")
    }

    /// Ordered list of question texts.
    pub fn quiz_questions(id: QuizId) -> String {
        format!("quiz:{id}:questions")
    }

    /// 0-based index of the active round.
    pub fn quiz_current_round(id: QuizId) -> String {
        format!("quiz:{id}:currentRound")
    }

    /// Registered participant set.
    pub fn quiz_participants(id: QuizId) -> String {
        format!("quiz:{id}:participants")
    }

    /// Submitted-participant set for one 1-based round number.
    pub fn quiz_submitted(id: QuizId, round: u32) -> String {
        format!("quiz:{id}:submitted:{round}")
    }

    /// Submission ledger for one participant: hash of round → entry.
    pub fn quiz_submissions(id: QuizId, participant: &MemberId) -> String {
        format!("quiz:{id}:submissions:{participant}")
    }
}
