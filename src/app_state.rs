//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::domain::EventBus;
use crate::external::{Authenticator, MemberDirectory, QuizGenerator};
use crate::service::{QuizService, RoomService, SessionService};
use crate::store::SharedStore;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Room lifecycle coordinator.
    pub room_service: Arc<RoomService>,
    /// Quiz round coordinator.
    pub quiz_service: Arc<QuizService>,
    /// Distributed session coordinator.
    pub session_service: Arc<SessionService>,
    /// External quiz-content generator.
    pub generator: Arc<dyn QuizGenerator>,
    /// External identity validator.
    pub authenticator: Arc<dyn Authenticator>,
    /// External member profile directory.
    pub directory: Arc<dyn MemberDirectory>,
    /// Event bus for WebSocket fan-out.
    pub event_bus: EventBus,
}

impl AppState {
    /// Wires the service layer over a shared store and collaborators.
    #[must_use]
    pub fn new(
        config: &GatewayConfig,
        store: Arc<dyn SharedStore>,
        generator: Arc<dyn QuizGenerator>,
        authenticator: Arc<dyn Authenticator>,
        directory: Arc<dyn MemberDirectory>,
    ) -> Self {
        let event_bus = EventBus::new(config.event_bus_capacity);
        let room_service = Arc::new(RoomService::new(
            Arc::clone(&store),
            event_bus.clone(),
            Arc::clone(&directory),
        ));
        let quiz_service = Arc::new(QuizService::new(
            Arc::clone(&store),
            event_bus.clone(),
            config.quiz_ttl,
        ));
        let session_service = Arc::new(SessionService::new(
            store,
            config.session_ttl,
            config.session_grace,
            config.terminate_ttl,
        ));
        Self {
            room_service,
            quiz_service,
            session_service,
            generator,
            authenticator,
            directory,
            event_bus,
        }
    }
}
