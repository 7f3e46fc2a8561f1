//! quizroom-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints, plus
//! the periodic expired-session sweep.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use chrono::Utc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use quizroom_gateway::api;
use quizroom_gateway::app_state::AppState;
use quizroom_gateway::config::GatewayConfig;
use quizroom_gateway::domain::RoomEvent;
use quizroom_gateway::external::{CannedGenerator, EchoDirectory, HandshakeAuthenticator};
use quizroom_gateway::store::{MemoryStore, SharedStore};
use quizroom_gateway::ws::handler::ws_handler;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = GatewayConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, "starting quizroom-gateway");

    // Single-node store; a networked backend plugs into the same trait
    // for multi-instance deployments.
    let store: Arc<dyn SharedStore> = Arc::new(MemoryStore::new());

    // Build application state with the default collaborators.
    let app_state = AppState::new(
        &config,
        store,
        Arc::new(CannedGenerator),
        Arc::new(HandshakeAuthenticator::default()),
        Arc::new(EchoDirectory),
    );

    // Periodic expired-session sweep.
    let sweep_state = app_state.clone();
    let sweep_interval = config.session_sweep_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            let result = sweep_state
                .session_service
                .remove_expired(Utc::now(), &mut |identity, record| {
                    sweep_state.event_bus.publish(RoomEvent::SessionExpired {
                        identity: identity.clone(),
                        session_id: record.session_id.clone(),
                        timestamp: Utc::now(),
                    });
                })
                .await;
            match result {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "expired sessions swept"),
                Err(e) => tracing::warn!(error = %e, "session sweep failed"),
            }
        }
    });

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
