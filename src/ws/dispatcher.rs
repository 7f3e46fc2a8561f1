//! Command dispatcher: routes typed commands to the coordinators.
//!
//! One error-translation layer lives here: a failed command never aborts
//! the connection. The error becomes a [`RoomEvent::CommandFailed`] on
//! the room topic plus an error envelope to the issuing client, so a
//! failure in one room cannot affect other rooms or sessions.
//!
//! Quiz generation is dispatched onto a background task; the triggering
//! command returns immediately and progress flows to the room as a
//! sequence of [`RoomEvent::GenerationProgress`] events. A generation
//! failure degrades to a single failed progress event with no automatic
//! retry.

use chrono::Utc;

use super::messages::{WsCommand, WsMessage, WsMessageType};
use super::subscription::SubscriptionManager;
use crate::app_state::AppState;
use crate::domain::room_event::GenerationStatus;
use crate::domain::{MemberId, QuizId, Room, RoomEvent, RoomId, SessionId};
use crate::error::GatewayError;
use crate::external::GenerationRequest;
use crate::service::SessionService;

/// Identity attached to one WebSocket connection after the handshake.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    /// Validated logical identity.
    pub identity: MemberId,
    /// This connection's session id.
    pub session_id: SessionId,
}

/// Routes decoded commands to the service layer.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    state: AppState,
}

impl Dispatcher {
    /// Creates a dispatcher over the shared application state.
    #[must_use]
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// The session coordinator, used by the connection loop for
    /// takeover checks and disconnect cleanup.
    #[must_use]
    pub fn session_service(&self) -> &SessionService {
        &self.state.session_service
    }

    /// Executes one command, translating any failure into a room-scoped
    /// error event and an error envelope for the issuing client.
    pub async fn dispatch(
        &self,
        ctx: &ConnectionContext,
        msg_id: &str,
        command: WsCommand,
        subs: &mut SubscriptionManager,
    ) -> Option<WsMessage> {
        let name = command.name();
        let room_id = command.room_id();

        match self.handle(ctx, command, subs).await {
            Ok(Some(payload)) => Some(WsMessage {
                id: msg_id.to_string(),
                msg_type: WsMessageType::Response,
                timestamp: Utc::now(),
                payload,
            }),
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(
                    identity = %ctx.identity,
                    command = name,
                    error = %err,
                    "command failed"
                );
                if let Some(room_id) = room_id {
                    self.state.event_bus.publish(RoomEvent::CommandFailed {
                        room_id,
                        command: name.to_string(),
                        code: err.error_code(),
                        message: err.to_string(),
                        timestamp: Utc::now(),
                    });
                }
                Some(WsMessage {
                    id: msg_id.to_string(),
                    msg_type: WsMessageType::Error,
                    timestamp: Utc::now(),
                    payload: serde_json::json!({
                        "code": err.error_code(),
                        "message": err.to_string(),
                    }),
                })
            }
        }
    }

    /// The command table body: one arm per command.
    async fn handle(
        &self,
        ctx: &ConnectionContext,
        command: WsCommand,
        subs: &mut SubscriptionManager,
    ) -> Result<Option<serde_json::Value>, GatewayError> {
        match command {
            WsCommand::Subscribe { room_ids } => {
                let (ids, wildcard) = parse_topic_ids(&room_ids);
                subs.subscribe(&ids, wildcard);
                Ok(Some(serde_json::json!({
                    "subscribed": ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                })))
            }
            WsCommand::Unsubscribe { room_ids } => {
                let (ids, _) = parse_topic_ids(&room_ids);
                subs.unsubscribe(&ids);
                Ok(Some(serde_json::json!({
                    "unsubscribed": ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "remaining_count": subs.count(),
                })))
            }
            WsCommand::JoinRoom { room_id, password } => {
                let room = self
                    .state
                    .room_service
                    .join(room_id, ctx.identity.clone(), password.as_deref())
                    .await?;
                subs.subscribe(&[room_id], false);
                Ok(Some(serde_json::json!({
                    "status": "joined",
                    "room_id": room.id,
                })))
            }
            WsCommand::LeaveRoom { room_id } => {
                self.state
                    .room_service
                    .leave(room_id, ctx.identity.clone())
                    .await?;
                subs.unsubscribe(&[room_id]);
                Ok(Some(serde_json::json!({"status": "left"})))
            }
            WsCommand::ToggleReady { room_id } => {
                let is_ready = self
                    .state
                    .room_service
                    .toggle_ready(room_id, ctx.identity.clone())
                    .await?;
                Ok(Some(serde_json::json!({"is_ready": is_ready})))
            }
            WsCommand::StartGame { room_id } => {
                self.state
                    .room_service
                    .start(room_id, ctx.identity.clone())
                    .await?;
                Ok(Some(serde_json::json!({"status": "started"})))
            }
            WsCommand::EndGame { room_id } => {
                self.state.room_service.end(room_id).await?;
                self.state.quiz_service.clear_game(room_id).await?;
                Ok(Some(serde_json::json!({"status": "ended"})))
            }
            WsCommand::GenerateQuiz { room_id } => {
                self.spawn_generation(room_id).await?;
                Ok(Some(serde_json::json!({"status": "accepted"})))
            }
            WsCommand::BroadcastGameStart { room_id } => {
                self.broadcast_game_start(room_id).await
            }
            WsCommand::SubmitAnswer {
                room_id,
                round_number,
                answer,
            } => {
                let quiz_id = self.bound_quiz(room_id).await?;
                let result = self
                    .state
                    .quiz_service
                    .submit(room_id, quiz_id, &ctx.identity, round_number, &answer)
                    .await?;
                let payload = serde_json::to_value(&result)
                    .map_err(|e| GatewayError::Internal(format!("result encode failed: {e}")))?;
                Ok(Some(payload))
            }
            WsCommand::NextQuestion {
                room_id,
                question_index,
                next_question_index,
            } => {
                let next = match (next_question_index, question_index) {
                    (Some(next), _) => next,
                    (None, Some(current)) => current + 1,
                    (None, None) => {
                        return Err(GatewayError::Validation(
                            "question index required".to_string(),
                        ));
                    }
                };
                let quiz_id = self.bound_quiz(room_id).await?;
                let total = self.state.quiz_service.total_rounds(quiz_id).await?;
                if next >= total {
                    // All questions played: close out the game.
                    self.state.room_service.end(room_id).await?;
                    self.state.quiz_service.clear_game(room_id).await?;
                    return Ok(Some(serde_json::json!({"status": "finished"})));
                }
                self.state
                    .quiz_service
                    .push_question(room_id, quiz_id, next)
                    .await?;
                Ok(Some(serde_json::json!({
                    "status": "question_pushed",
                    "index": next,
                })))
            }
            WsCommand::RequestQuestion { room_id } => {
                let quiz_id = self.bound_quiz(room_id).await?;
                let current = self.state.quiz_service.current_round(quiz_id).await?;
                self.state
                    .quiz_service
                    .push_question(room_id, quiz_id, current)
                    .await?;
                Ok(Some(serde_json::json!({
                    "status": "question_pushed",
                    "index": current,
                })))
            }
            WsCommand::Chat { room_id, content } => {
                let sender_name = self.state.directory.display_name(&ctx.identity).await;
                self.state.event_bus.publish(RoomEvent::Chat {
                    room_id,
                    sender_id: ctx.identity.clone(),
                    sender_name,
                    content,
                    timestamp: Utc::now(),
                });
                Ok(None)
            }
            WsCommand::RefreshSession => {
                let refreshed = self
                    .state
                    .session_service
                    .refresh(&ctx.identity, &ctx.session_id)
                    .await?;
                Ok(Some(serde_json::json!({"refreshed": refreshed})))
            }
            WsCommand::TerminateOtherSessions => {
                let marked = self
                    .state
                    .session_service
                    .mark_others_for_termination(&ctx.identity, &ctx.session_id)
                    .await?;
                Ok(Some(serde_json::json!({"marked": marked})))
            }
        }
    }

    /// Resolves the quiz bound to a room or fails with InvalidState.
    async fn bound_quiz(&self, room_id: RoomId) -> Result<QuizId, GatewayError> {
        self.state
            .quiz_service
            .bound_quiz(room_id)
            .await?
            .ok_or_else(|| GatewayError::InvalidState("no active quiz for this room".to_string()))
    }

    /// Claims the game-start broadcast: announces the game with its quiz
    /// id and pushes the first question. A second claim is a no-op so the
    /// broadcast happens once across all instances.
    async fn broadcast_game_start(
        &self,
        room_id: RoomId,
    ) -> Result<Option<serde_json::Value>, GatewayError> {
        let quiz_id = self.bound_quiz(room_id).await?;
        if !self.state.quiz_service.claim_game_start(room_id).await? {
            tracing::debug!(room = %room_id, "game start already broadcast");
            return Ok(Some(serde_json::json!({"status": "already_started"})));
        }

        let room = self.state.room_service.get(room_id).await?;
        let members = self.state.room_service.member_snapshot(&room).await?;
        self.state.event_bus.publish(RoomEvent::GameStarted {
            room_id,
            quiz_id: Some(quiz_id),
            members,
            timestamp: Utc::now(),
        });
        self.state
            .quiz_service
            .push_question(room_id, quiz_id, 0)
            .await?;
        Ok(Some(serde_json::json!({
            "status": "started",
            "quiz_id": quiz_id,
        })))
    }

    /// Publishes one generation-progress event.
    fn publish_progress(
        &self,
        room_id: RoomId,
        status: GenerationStatus,
        progress: u8,
        message: &str,
        quiz_id: Option<QuizId>,
    ) {
        self.state.event_bus.publish(RoomEvent::GenerationProgress {
            room_id,
            status,
            progress,
            message: message.to_string(),
            quiz_id,
            timestamp: Utc::now(),
        });
    }

    /// Starts background quiz generation for a room. The command returns
    /// once the job is spawned; progress and completion arrive as events.
    async fn spawn_generation(&self, room_id: RoomId) -> Result<(), GatewayError> {
        self.publish_progress(
            room_id,
            GenerationStatus::Started,
            10,
            "Quiz generation started",
            None,
        );

        let room = match self.state.room_service.get(room_id).await {
            Ok(room) => room,
            Err(err) => {
                self.publish_progress(
                    room_id,
                    GenerationStatus::Failed,
                    0,
                    &format!("room lookup failed: {err}"),
                    None,
                );
                return Ok(());
            }
        };

        self.publish_progress(
            room_id,
            GenerationStatus::InProgress,
            30,
            &format!(
                "Generating {} / {} questions",
                room.main_category.label(),
                room.sub_category.label()
            ),
            None,
        );

        let dispatcher = self.clone();
        tokio::spawn(async move {
            dispatcher.run_generation(room).await;
        });
        Ok(())
    }

    /// The background half of quiz generation.
    async fn run_generation(&self, room: Room) {
        let room_id = room.id;
        self.publish_progress(
            room_id,
            GenerationStatus::InProgress,
            50,
            "Generating questions",
            None,
        );

        let request = GenerationRequest {
            room_id,
            main_category: room.main_category,
            sub_category: room.sub_category,
            answer_type: room.answer_type,
            difficulty: room.difficulty,
            problem_count: room.problem_count,
        };

        let generated = match self.state.generator.generate(&request).await {
            Ok(generated) => generated,
            Err(err) => {
                tracing::error!(room = %room_id, error = %err, "quiz generation failed");
                self.publish_progress(
                    room_id,
                    GenerationStatus::Failed,
                    0,
                    &format!("quiz generation failed: {err}"),
                    None,
                );
                return;
            }
        };

        self.publish_progress(
            room_id,
            GenerationStatus::InProgress,
            80,
            "Processing generated questions",
            None,
        );

        let quiz_id = QuizId::new();
        let stored = match self
            .state
            .quiz_service
            .start_round(
                quiz_id,
                &generated.questions,
                &generated.answer_key,
                &room.players,
            )
            .await
        {
            Ok(()) => self.state.quiz_service.bind_room(room_id, quiz_id).await,
            Err(err) => Err(err),
        };
        if let Err(err) = stored {
            tracing::error!(room = %room_id, error = %err, "failed to store generated quiz");
            self.publish_progress(
                room_id,
                GenerationStatus::Failed,
                0,
                &format!("failed to store quiz: {err}"),
                None,
            );
            return;
        }

        tracing::info!(room = %room_id, quiz = %quiz_id, "quiz generated and bound");
        self.publish_progress(
            room_id,
            GenerationStatus::Completed,
            100,
            "Quiz generated; the game can start",
            Some(quiz_id),
        );

        // Follow-up announcement so clients waiting on generation flip
        // into the game view.
        match self.state.room_service.member_snapshot(&room).await {
            Ok(members) => {
                self.state.event_bus.publish(RoomEvent::GameStarted {
                    room_id,
                    quiz_id: Some(quiz_id),
                    members,
                    timestamp: Utc::now(),
                });
            }
            Err(err) => {
                tracing::warn!(room = %room_id, error = %err, "membership snapshot failed");
            }
        }
    }
}

/// Parses topic strings into room ids, detecting the `"*"` wildcard.
fn parse_topic_ids(raw: &[String]) -> (Vec<RoomId>, bool) {
    let mut ids = Vec::new();
    let mut wildcard = false;
    for value in raw {
        if value == "*" {
            wildcard = true;
        } else if let Ok(uuid) = value.parse::<uuid::Uuid>() {
            ids.push(RoomId::from_uuid(uuid));
        }
    }
    (ids, wildcard)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::domain::room::{
        AnswerType, Difficulty, MainCategory, RoomSettings, SubCategory,
    };
    use crate::domain::room_event::RoundSignal;
    use crate::external::{CannedGenerator, EchoDirectory, HandshakeAuthenticator};
    use crate::store::{MemoryStore, SharedStore};
    use std::sync::Arc;
    use tokio::sync::broadcast::error::TryRecvError;

    fn state() -> AppState {
        AppState::new(
            &GatewayConfig::default(),
            Arc::new(MemoryStore::new()) as Arc<dyn SharedStore>,
            Arc::new(CannedGenerator),
            Arc::new(HandshakeAuthenticator::default()),
            Arc::new(EchoDirectory),
        )
    }

    fn ctx(identity: &str) -> ConnectionContext {
        ConnectionContext {
            identity: MemberId::from(identity),
            session_id: SessionId::from(format!("ws-{identity}")),
        }
    }

    fn settings() -> RoomSettings {
        RoomSettings {
            title: "Dispatch test".to_string(),
            capacity: 4,
            main_category: MainCategory::General,
            sub_category: SubCategory::Mixed,
            difficulty: Difficulty::Easy,
            answer_type: AnswerType::MultipleChoice,
            problem_count: 2,
            password: None,
        }
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<RoomEvent>) -> Vec<RoomEvent> {
        let mut events = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                Err(TryRecvError::Lagged(_)) => {}
            }
        }
        events
    }

    #[tokio::test]
    async fn failed_command_becomes_room_scoped_error_event() {
        let state = state();
        let dispatcher = Dispatcher::new(state.clone());
        let mut rx = state.event_bus.subscribe();
        let mut subs = SubscriptionManager::new();

        let ghost_room = RoomId::new();
        let response = dispatcher
            .dispatch(
                &ctx("alice"),
                "msg-1",
                WsCommand::LeaveRoom { room_id: ghost_room },
                &mut subs,
            )
            .await;

        let Some(response) = response else {
            panic!("expected an error envelope");
        };
        assert_eq!(response.msg_type, WsMessageType::Error);
        assert_eq!(response.id, "msg-1");

        let events = drain(&mut rx);
        let Some(RoomEvent::CommandFailed { room_id, command, code, .. }) = events.first() else {
            panic!("expected a command-failed event");
        };
        assert_eq!(*room_id, ghost_room);
        assert_eq!(command, "leave_room");
        assert_eq!(*code, GatewayError::RoomNotFound(*ghost_room.as_uuid()).error_code());
    }

    #[tokio::test]
    async fn join_subscribes_the_connection_to_the_room_topic() {
        let state = state();
        let dispatcher = Dispatcher::new(state.clone());
        let room = state
            .room_service
            .create(MemberId::from("owner"), settings())
            .await;
        let Ok(room) = room else {
            panic!("create failed");
        };

        let mut subs = SubscriptionManager::new();
        let response = dispatcher
            .dispatch(
                &ctx("alice"),
                "msg-1",
                WsCommand::JoinRoom {
                    room_id: room.id,
                    password: None,
                },
                &mut subs,
            )
            .await;
        assert!(response.is_some_and(|r| r.msg_type == WsMessageType::Response));
        assert!(subs.matches(room.id));
    }

    #[tokio::test]
    async fn full_game_flow_over_commands() {
        let state = state();
        let dispatcher = Dispatcher::new(state.clone());
        let owner = ctx("owner");
        let alice = ctx("alice");
        let mut owner_subs = SubscriptionManager::new();
        let mut alice_subs = SubscriptionManager::new();

        let room = state
            .room_service
            .create(MemberId::from("owner"), settings())
            .await;
        let Ok(room) = room else {
            panic!("create failed");
        };
        let room_id = room.id;

        let r = dispatcher
            .dispatch(
                &alice,
                "1",
                WsCommand::JoinRoom {
                    room_id,
                    password: None,
                },
                &mut alice_subs,
            )
            .await;
        assert!(r.is_some_and(|m| m.msg_type == WsMessageType::Response));
        let r = dispatcher
            .dispatch(&alice, "2", WsCommand::ToggleReady { room_id }, &mut alice_subs)
            .await;
        assert!(r.is_some_and(|m| m.msg_type == WsMessageType::Response));
        let r = dispatcher
            .dispatch(&owner, "3", WsCommand::StartGame { room_id }, &mut owner_subs)
            .await;
        assert!(r.is_some_and(|m| m.msg_type == WsMessageType::Response));

        // Generation runs on a background task; wait for the binding.
        let r = dispatcher
            .dispatch(&owner, "4", WsCommand::GenerateQuiz { room_id }, &mut owner_subs)
            .await;
        assert!(r.is_some_and(|m| m.msg_type == WsMessageType::Response));
        let mut quiz_id = None;
        for _ in 0..50 {
            if let Ok(Some(found)) = state.quiz_service.bound_quiz(room_id).await {
                quiz_id = Some(found);
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(quiz_id.is_some(), "generation never bound a quiz");

        let mut rx = state.event_bus.subscribe();
        let r = dispatcher
            .dispatch(
                &owner,
                "5",
                WsCommand::BroadcastGameStart { room_id },
                &mut owner_subs,
            )
            .await;
        assert!(r.is_some_and(|m| m.msg_type == WsMessageType::Response));

        // Second broadcast is a no-op claim.
        let r = dispatcher
            .dispatch(
                &owner,
                "6",
                WsCommand::BroadcastGameStart { room_id },
                &mut owner_subs,
            )
            .await;
        let Some(r) = r else {
            panic!("expected response");
        };
        assert_eq!(
            r.payload.get("status").and_then(|v| v.as_str()),
            Some("already_started")
        );

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(e, RoomEvent::GameStarted { .. })));
        assert!(
            events
                .iter()
                .any(|e| matches!(e, RoomEvent::Question { round_index: 0, .. }))
        );

        // Both players answer round 1; completion should say next question.
        let r = dispatcher
            .dispatch(
                &owner,
                "7",
                WsCommand::SubmitAnswer {
                    room_id,
                    round_number: 1,
                    answer: "a".to_string(),
                },
                &mut owner_subs,
            )
            .await;
        assert!(r.is_some_and(|m| m.msg_type == WsMessageType::Response));
        let r = dispatcher
            .dispatch(
                &alice,
                "8",
                WsCommand::SubmitAnswer {
                    room_id,
                    round_number: 1,
                    answer: "b".to_string(),
                },
                &mut alice_subs,
            )
            .await;
        assert!(r.is_some_and(|m| m.msg_type == WsMessageType::Response));

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            RoomEvent::RoundComplete {
                signal: RoundSignal::NextQuestion,
                ..
            }
        )));

        // Advancing past the last question finishes the game.
        let r = dispatcher
            .dispatch(
                &owner,
                "9",
                WsCommand::NextQuestion {
                    room_id,
                    question_index: Some(0),
                    next_question_index: None,
                },
                &mut owner_subs,
            )
            .await;
        assert!(r.is_some_and(|m| m.msg_type == WsMessageType::Response));
        let r = dispatcher
            .dispatch(
                &owner,
                "10",
                WsCommand::NextQuestion {
                    room_id,
                    question_index: Some(1),
                    next_question_index: None,
                },
                &mut owner_subs,
            )
            .await;
        let Some(r) = r else {
            panic!("expected response");
        };
        assert_eq!(
            r.payload.get("status").and_then(|v| v.as_str()),
            Some("finished")
        );

        let room = state.room_service.get(room_id).await.ok();
        assert!(room.is_some_and(|r| r.status == crate::domain::RoomStatus::Waiting));
    }

    #[tokio::test]
    async fn generation_failure_degrades_to_single_failed_event() {
        let state = state();
        let dispatcher = Dispatcher::new(state.clone());
        let mut rx = state.event_bus.subscribe();
        let mut subs = SubscriptionManager::new();

        // No such room: generation fails before the background task.
        let r = dispatcher
            .dispatch(
                &ctx("owner"),
                "1",
                WsCommand::GenerateQuiz { room_id: RoomId::new() },
                &mut subs,
            )
            .await;
        assert!(r.is_some_and(|m| m.msg_type == WsMessageType::Response));

        let events = drain(&mut rx);
        let failed = events
            .iter()
            .filter(|e| matches!(
                e,
                RoomEvent::GenerationProgress {
                    status: GenerationStatus::Failed,
                    ..
                }
            ))
            .count();
        assert_eq!(failed, 1);
    }

    #[tokio::test]
    async fn refresh_session_reports_registration_state() {
        let state = state();
        let dispatcher = Dispatcher::new(state.clone());
        let caller = ctx("alice");
        let mut subs = SubscriptionManager::new();

        let r = dispatcher
            .dispatch(&caller, "1", WsCommand::RefreshSession, &mut subs)
            .await;
        let Some(r) = r else {
            panic!("expected response");
        };
        assert_eq!(r.payload.get("refreshed").and_then(|v| v.as_bool()), Some(false));

        let reg = state
            .session_service
            .register(
                &caller.identity,
                &caller.session_id,
                "cred",
                Utc::now() + chrono::Duration::hours(1),
            )
            .await;
        assert!(reg.is_ok());

        let r = dispatcher
            .dispatch(&caller, "2", WsCommand::RefreshSession, &mut subs)
            .await;
        let Some(r) = r else {
            panic!("expected response");
        };
        assert_eq!(r.payload.get("refreshed").and_then(|v| v.as_bool()), Some(true));
    }
}
