//! Round coordinator: per-round answer bookkeeping over the shared store.
//!
//! A quiz session is an ordered answer key, a registered participant set,
//! and a 0-based active round index, all TTL-bounded in the store. A
//! submission is accepted only for the active round and recorded with a
//! single conditional insert, so a participant can never double-submit
//! even when the same answer races in from two connections. Round
//! completion is decided from the cardinality returned by the same atomic
//! set add that recorded the submission, so the "all participants
//! answered" signal fires exactly once per round.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::keys;
use crate::domain::room_event::RoundSignal;
use crate::domain::{EventBus, MemberId, QuizId, RoomEvent, RoomId};
use crate::error::GatewayError;
use crate::store::SharedStore;

/// One accepted submission, returned to the submitting connection.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitResult {
    /// 1-based round number.
    pub round_number: u32,
    /// Whether the submission matched the answer key.
    pub is_correct: bool,
    /// The correct answer for the round.
    pub correct_answer: String,
    /// Submitting participant.
    pub participant_id: MemberId,
    /// Acceptance timestamp.
    pub timestamp: DateTime<Utc>,
}

/// Ledger entry stored per (participant, round).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LedgerEntry {
    round: u32,
    answer: String,
    correct: bool,
    timestamp_ms: i64,
}

/// Quiz round coordinator.
#[derive(Debug, Clone)]
pub struct QuizService {
    store: Arc<dyn SharedStore>,
    event_bus: EventBus,
    quiz_ttl: Duration,
}

impl QuizService {
    /// Creates a quiz service.
    #[must_use]
    pub fn new(store: Arc<dyn SharedStore>, event_bus: EventBus, quiz_ttl: Duration) -> Self {
        Self {
            store,
            event_bus,
            quiz_ttl,
        }
    }

    /// Initializes round state for a fresh quiz: stores the questions and
    /// answer key, registers the participants, and activates round 0.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] when the question and answer
    /// lists are empty or of different lengths.
    pub async fn start_round(
        &self,
        quiz_id: QuizId,
        questions: &[String],
        answer_key: &[String],
        participants: &[MemberId],
    ) -> Result<(), GatewayError> {
        if questions.is_empty() || questions.len() != answer_key.len() {
            return Err(GatewayError::Validation(
                "questions and answer key must be non-empty and of equal length".to_string(),
            ));
        }
        if participants.is_empty() {
            return Err(GatewayError::Validation(
                "quiz needs at least one participant".to_string(),
            ));
        }
        let ttl = Some(self.quiz_ttl);
        for question in questions {
            self.store
                .list_push(&keys::quiz_questions(quiz_id), question, ttl)
                .await?;
        }
        for answer in answer_key {
            self.store
                .list_push(&keys::quiz_answer_key(quiz_id), answer, ttl)
                .await?;
        }
        for participant in participants {
            self.store
                .set_add(&keys::quiz_participants(quiz_id), participant.as_str(), ttl)
                .await?;
        }
        self.store
            .put(&keys::quiz_current_round(quiz_id), "0", ttl)
            .await?;

        tracing::info!(
            quiz = %quiz_id,
            rounds = questions.len(),
            participants = participants.len(),
            "round state initialized"
        );
        Ok(())
    }

    /// Binds a room to its generated quiz for the lifetime of one game.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Store`] on store failures.
    pub async fn bind_room(&self, room_id: RoomId, quiz_id: QuizId) -> Result<(), GatewayError> {
        self.store
            .put(
                &keys::room_quiz(room_id),
                &quiz_id.to_string(),
                Some(self.quiz_ttl),
            )
            .await?;
        Ok(())
    }

    /// Returns the quiz bound to a room, if a game is in flight.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Store`] on store failures.
    pub async fn bound_quiz(&self, room_id: RoomId) -> Result<Option<QuizId>, GatewayError> {
        let Some(raw) = self.store.get(&keys::room_quiz(room_id)).await? else {
            return Ok(None);
        };
        Ok(raw.parse::<uuid::Uuid>().ok().map(QuizId::from_uuid))
    }

    /// Atomically claims the game-start broadcast for a room. Returns
    /// `false` when another instance already claimed it.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Store`] on store failures.
    pub async fn claim_game_start(&self, room_id: RoomId) -> Result<bool, GatewayError> {
        let result = self
            .store
            .put_versioned(
                &keys::room_game_status(room_id),
                "STARTED",
                0,
                Some(self.quiz_ttl),
            )
            .await;
        match result {
            Ok(_) => Ok(true),
            Err(crate::store::StoreError::VersionMismatch { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Clears the game-start claim and quiz binding when a game ends.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Store`] on store failures.
    pub async fn clear_game(&self, room_id: RoomId) -> Result<(), GatewayError> {
        self.store.remove(&keys::room_game_status(room_id)).await?;
        self.store.remove(&keys::room_quiz(room_id)).await?;
        Ok(())
    }

    /// Returns the total number of rounds in a quiz (0 when unknown).
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Store`] on store failures.
    pub async fn total_rounds(&self, quiz_id: QuizId) -> Result<u32, GatewayError> {
        Ok(self.store.list_len(&keys::quiz_answer_key(quiz_id)).await? as u32)
    }

    /// Returns the 0-based active round index, initializing it to 0 when
    /// absent.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Store`] on store failures.
    pub async fn current_round(&self, quiz_id: QuizId) -> Result<u32, GatewayError> {
        let key = keys::quiz_current_round(quiz_id);
        match self.store.get(&key).await? {
            Some(raw) => Ok(raw.parse().unwrap_or(0)),
            None => {
                self.store.put(&key, "0", Some(self.quiz_ttl)).await?;
                Ok(0)
            }
        }
    }

    /// Returns whether `participant` has submitted for a 1-based round.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Store`] on store failures.
    pub async fn has_submitted(
        &self,
        quiz_id: QuizId,
        participant: &MemberId,
        round_number: u32,
    ) -> Result<bool, GatewayError> {
        self.store
            .set_contains(&keys::quiz_submitted(quiz_id, round_number), participant.as_str())
            .await
            .map_err(Into::into)
    }

    /// Accepts one answer submission for the active round.
    ///
    /// Validation order: the round number must be in range, must target
    /// the active round, and the participant must be registered and not
    /// have submitted yet. The duplicate check is a single conditional
    /// insert into the participant's ledger; the completion check uses
    /// the post-write cardinality of the submitted set, so the round
    /// completion signal fires exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] for an out-of-range round,
    /// [`GatewayError::RoundNotActive`] for a stale or future round,
    /// [`GatewayError::NotMember`] for unregistered participants,
    /// [`GatewayError::AlreadySubmitted`] on resubmission, and
    /// [`GatewayError::QuizNotFound`] when no round state exists.
    pub async fn submit(
        &self,
        room_id: RoomId,
        quiz_id: QuizId,
        participant: &MemberId,
        round_number: u32,
        answer: &str,
    ) -> Result<SubmitResult, GatewayError> {
        let total = self.total_rounds(quiz_id).await?;
        if total == 0 {
            return Err(GatewayError::QuizNotFound(*quiz_id.as_uuid()));
        }
        if round_number < 1 || round_number > total {
            return Err(GatewayError::Validation(format!(
                "invalid round number {round_number}; quiz has {total} rounds"
            )));
        }

        let current = self.current_round(quiz_id).await?;
        if round_number - 1 != current {
            return Err(GatewayError::RoundNotActive(format!(
                "round {round_number} is not the active round"
            )));
        }

        if !self
            .store
            .set_contains(&keys::quiz_participants(quiz_id), participant.as_str())
            .await?
        {
            return Err(GatewayError::NotMember);
        }

        let correct_answer = self
            .store
            .list_get(&keys::quiz_answer_key(quiz_id), u64::from(round_number - 1))
            .await?
            .ok_or(GatewayError::QuizNotFound(*quiz_id.as_uuid()))?;

        let normalized = answer.trim().to_lowercase();
        let is_correct = normalized == correct_answer.trim().to_lowercase();
        let timestamp = Utc::now();

        let entry = LedgerEntry {
            round: round_number,
            answer: normalized,
            correct: is_correct,
            timestamp_ms: timestamp.timestamp_millis(),
        };
        let entry_json = serde_json::to_string(&entry)
            .map_err(|e| GatewayError::Internal(format!("ledger encode failed: {e}")))?;

        // The one write that decides who submitted first.
        let inserted = self
            .store
            .hash_set_nx(
                &keys::quiz_submissions(quiz_id, participant),
                &round_number.to_string(),
                &entry_json,
                Some(self.quiz_ttl),
            )
            .await?;
        if !inserted {
            return Err(GatewayError::AlreadySubmitted {
                round: round_number,
            });
        }

        let added = self
            .store
            .set_add(
                &keys::quiz_submitted(quiz_id, round_number),
                participant.as_str(),
                Some(self.quiz_ttl),
            )
            .await?;

        self.event_bus.publish(RoomEvent::AnswerResult {
            room_id,
            round_number,
            participant_id: participant.clone(),
            is_correct,
            correct_answer: correct_answer.clone(),
            timestamp,
        });

        let registered = self
            .store
            .set_len(&keys::quiz_participants(quiz_id))
            .await?;
        if added.inserted && added.len == registered {
            let signal = if round_number == total {
                RoundSignal::QuizEnd
            } else {
                RoundSignal::NextQuestion
            };
            tracing::info!(
                quiz = %quiz_id,
                round = round_number,
                ?signal,
                "round complete"
            );
            self.event_bus.publish(RoomEvent::RoundComplete {
                room_id,
                round_number,
                signal,
                timestamp: Utc::now(),
            });
        }

        Ok(SubmitResult {
            round_number,
            is_correct,
            correct_answer,
            participant_id: participant.clone(),
            timestamp,
        })
    }

    /// Sets the active round index (bounds-checked).
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] when `new_index` is out of
    /// range, or [`GatewayError::QuizNotFound`] when no round state
    /// exists.
    pub async fn advance_round(&self, quiz_id: QuizId, new_index: u32) -> Result<(), GatewayError> {
        let total = self.total_rounds(quiz_id).await?;
        if total == 0 {
            return Err(GatewayError::QuizNotFound(*quiz_id.as_uuid()));
        }
        if new_index >= total {
            return Err(GatewayError::Validation(format!(
                "round index {new_index} out of range; quiz has {total} rounds"
            )));
        }
        self.store
            .put(
                &keys::quiz_current_round(quiz_id),
                &new_index.to_string(),
                Some(self.quiz_ttl),
            )
            .await?;
        Ok(())
    }

    /// Activates a round and publishes its public question payload: text,
    /// index, and last-question flag. The correct answer never rides
    /// along.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] when the index is out of
    /// range, or [`GatewayError::QuizNotFound`] when no round state
    /// exists.
    pub async fn push_question(
        &self,
        room_id: RoomId,
        quiz_id: QuizId,
        index: u32,
    ) -> Result<(), GatewayError> {
        let total = self.store.list_len(&keys::quiz_questions(quiz_id)).await? as u32;
        if total == 0 {
            return Err(GatewayError::QuizNotFound(*quiz_id.as_uuid()));
        }
        if index >= total {
            return Err(GatewayError::Validation(format!(
                "question index {index} out of range; quiz has {total} questions"
            )));
        }
        let question_text = self
            .store
            .list_get(&keys::quiz_questions(quiz_id), u64::from(index))
            .await?
            .ok_or(GatewayError::QuizNotFound(*quiz_id.as_uuid()))?;

        self.advance_round(quiz_id, index).await?;

        self.event_bus.publish(RoomEvent::Question {
            room_id,
            round_index: index,
            question_text,
            is_last_question: index + 1 == total,
            timestamp: Utc::now(),
        });
        tracing::info!(quiz = %quiz_id, index, "question pushed");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use tokio::sync::broadcast::error::TryRecvError;

    struct Fixture {
        svc: QuizService,
        bus: EventBus,
        room_id: RoomId,
        quiz_id: QuizId,
    }

    async fn fixture(participants: &[&str], answers: &[&str]) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let bus = EventBus::new(100);
        let svc = QuizService::new(
            store as Arc<dyn SharedStore>,
            bus.clone(),
            Duration::from_secs(1800),
        );
        let quiz_id = QuizId::new();
        let questions: Vec<String> = answers
            .iter()
            .enumerate()
            .map(|(i, _)| format!("Question {}", i + 1))
            .collect();
        let answer_key: Vec<String> = answers.iter().map(|a| (*a).to_string()).collect();
        let members: Vec<MemberId> = participants.iter().map(|p| MemberId::from(*p)).collect();
        let result = svc
            .start_round(quiz_id, &questions, &answer_key, &members)
            .await;
        assert!(result.is_ok());
        Fixture {
            svc,
            bus,
            room_id: RoomId::new(),
            quiz_id,
        }
    }

    fn drain_round_completes(
        rx: &mut tokio::sync::broadcast::Receiver<RoomEvent>,
    ) -> Vec<RoomEvent> {
        let mut completes = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(event) => {
                    if matches!(event, RoomEvent::RoundComplete { .. }) {
                        completes.push(event);
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                Err(TryRecvError::Lagged(_)) => {}
            }
        }
        completes
    }

    #[tokio::test]
    async fn grading_is_case_insensitive_and_trimmed() {
        let f = fixture(&["a"], &["Paris"]).await;
        let result = f
            .svc
            .submit(f.room_id, f.quiz_id, &MemberId::from("a"), 1, "  pArIs ")
            .await;
        let Ok(result) = result else {
            panic!("submit failed");
        };
        assert!(result.is_correct);
        assert_eq!(result.correct_answer, "Paris");
        assert_eq!(result.round_number, 1);
    }

    #[tokio::test]
    async fn resubmission_returns_conflict_and_keeps_ledger_unchanged() {
        let f = fixture(&["a", "b"], &["x", "y"]).await;
        let member = MemberId::from("a");
        let first = f.svc.submit(f.room_id, f.quiz_id, &member, 1, "x").await;
        assert!(first.is_ok());

        let second = f.svc.submit(f.room_id, f.quiz_id, &member, 1, "y").await;
        assert!(matches!(
            second,
            Err(GatewayError::AlreadySubmitted { round: 1 })
        ));

        // Ledger still holds exactly one entry for round 1.
        assert_eq!(
            f.svc.has_submitted(f.quiz_id, &member, 1).await.ok(),
            Some(true)
        );
    }

    #[tokio::test]
    async fn round_completes_exactly_once_after_last_distinct_submission() {
        let f = fixture(&["a", "b", "c"], &["x", "y"]).await;
        let mut rx = f.bus.subscribe();

        let r = f
            .svc
            .submit(f.room_id, f.quiz_id, &MemberId::from("a"), 1, "x")
            .await;
        assert!(r.is_ok());
        assert!(drain_round_completes(&mut rx).is_empty());

        let r = f
            .svc
            .submit(f.room_id, f.quiz_id, &MemberId::from("b"), 1, "wrong")
            .await;
        assert!(r.is_ok());
        assert!(drain_round_completes(&mut rx).is_empty());

        let r = f
            .svc
            .submit(f.room_id, f.quiz_id, &MemberId::from("c"), 1, "x")
            .await;
        assert!(r.is_ok());
        let completes = drain_round_completes(&mut rx);
        assert_eq!(completes.len(), 1);
        let Some(RoomEvent::RoundComplete {
            round_number,
            signal,
            ..
        }) = completes.first()
        else {
            panic!("expected a round completion");
        };
        assert_eq!(*round_number, 1);
        assert_eq!(*signal, RoundSignal::NextQuestion);
    }

    #[tokio::test]
    async fn final_round_completion_signals_quiz_end() {
        let f = fixture(&["a"], &["x", "y"]).await;
        let mut rx = f.bus.subscribe();

        let r = f
            .svc
            .submit(f.room_id, f.quiz_id, &MemberId::from("a"), 1, "x")
            .await;
        assert!(r.is_ok());
        let r = f.svc.advance_round(f.quiz_id, 1).await;
        assert!(r.is_ok());
        let r = f
            .svc
            .submit(f.room_id, f.quiz_id, &MemberId::from("a"), 2, "y")
            .await;
        assert!(r.is_ok());

        let completes = drain_round_completes(&mut rx);
        assert_eq!(completes.len(), 2);
        let Some(RoomEvent::RoundComplete { signal, .. }) = completes.last() else {
            panic!("expected a round completion");
        };
        assert_eq!(*signal, RoundSignal::QuizEnd);
    }

    #[tokio::test]
    async fn stale_and_future_rounds_are_rejected_not_queued() {
        let f = fixture(&["a"], &["x", "y", "z"]).await;
        // currentRound is 0; round 2 is in range but not active.
        let result = f
            .svc
            .submit(f.room_id, f.quiz_id, &MemberId::from("a"), 2, "y")
            .await;
        assert!(matches!(result, Err(GatewayError::RoundNotActive(_))));

        // Out-of-range rounds are a validation failure.
        let result = f
            .svc
            .submit(f.room_id, f.quiz_id, &MemberId::from("a"), 4, "y")
            .await;
        assert!(matches!(result, Err(GatewayError::Validation(_))));
        let result = f
            .svc
            .submit(f.room_id, f.quiz_id, &MemberId::from("a"), 0, "y")
            .await;
        assert!(matches!(result, Err(GatewayError::Validation(_))));
    }

    #[tokio::test]
    async fn unregistered_participants_cannot_submit() {
        let f = fixture(&["a"], &["x"]).await;
        let result = f
            .svc
            .submit(f.room_id, f.quiz_id, &MemberId::from("ghost"), 1, "x")
            .await;
        assert!(matches!(result, Err(GatewayError::NotMember)));
    }

    #[tokio::test]
    async fn unknown_quiz_is_not_found() {
        let f = fixture(&["a"], &["x"]).await;
        let result = f
            .svc
            .submit(f.room_id, QuizId::new(), &MemberId::from("a"), 1, "x")
            .await;
        assert!(matches!(result, Err(GatewayError::QuizNotFound(_))));
    }

    #[tokio::test]
    async fn advance_round_is_bounds_checked() {
        let f = fixture(&["a"], &["x", "y"]).await;
        assert!(f.svc.advance_round(f.quiz_id, 1).await.is_ok());
        assert_eq!(f.svc.current_round(f.quiz_id).await.ok(), Some(1));
        assert!(matches!(
            f.svc.advance_round(f.quiz_id, 2).await,
            Err(GatewayError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn push_question_publishes_text_without_answer() {
        let f = fixture(&["a"], &["x", "y"]).await;
        let mut rx = f.bus.subscribe();
        let result = f.svc.push_question(f.room_id, f.quiz_id, 1).await;
        assert!(result.is_ok());

        let event = rx.try_recv().ok();
        let Some(RoomEvent::Question {
            round_index,
            question_text,
            is_last_question,
            ..
        }) = event
        else {
            panic!("expected a question event");
        };
        assert_eq!(round_index, 1);
        assert_eq!(question_text, "Question 2");
        assert!(is_last_question);
        // Pushing the question activates its round.
        assert_eq!(f.svc.current_round(f.quiz_id).await.ok(), Some(1));
    }

    #[tokio::test]
    async fn game_start_claim_is_single_winner() {
        let f = fixture(&["a"], &["x"]).await;
        assert_eq!(f.svc.claim_game_start(f.room_id).await.ok(), Some(true));
        assert_eq!(f.svc.claim_game_start(f.room_id).await.ok(), Some(false));

        let result = f.svc.clear_game(f.room_id).await;
        assert!(result.is_ok());
        assert_eq!(f.svc.claim_game_start(f.room_id).await.ok(), Some(true));
    }

    #[tokio::test]
    async fn room_quiz_binding_round_trips() {
        let f = fixture(&["a"], &["x"]).await;
        assert_eq!(f.svc.bound_quiz(f.room_id).await.ok(), Some(None));
        let result = f.svc.bind_room(f.room_id, f.quiz_id).await;
        assert!(result.is_ok());
        assert_eq!(
            f.svc.bound_quiz(f.room_id).await.ok(),
            Some(Some(f.quiz_id))
        );
    }
}
