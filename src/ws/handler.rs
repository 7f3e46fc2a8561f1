//! Axum WebSocket upgrade handler.
//!
//! The handshake carries the caller's identity and credential token as
//! query parameters; they are validated by the external authenticator,
//! the session is registered (resolving duplicate logins), and the
//! connection loop takes over.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use super::connection::run_connection;
use super::dispatcher::{ConnectionContext, Dispatcher};
use crate::app_state::AppState;
use crate::domain::SessionId;
use crate::error::GatewayError;

/// Handshake query parameters for `GET /ws`.
#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    /// Logical identity (validated upstream).
    pub identity: String,
    /// Credential token; its reference groups reconnecting sessions.
    pub token: String,
    /// Session id to resume; generated when absent. Ids with the
    /// `token-` prefix are treated as reconnect-style.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// `GET /ws` — Upgrade HTTP connection to WebSocket.
///
/// # Errors
///
/// Returns a [`GatewayError`] response when authentication or session
/// registration fails.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, GatewayError> {
    let auth = state
        .authenticator
        .authenticate(&params.identity, &params.token)
        .await?;

    let session_id = SessionId::from(
        params
            .session_id
            .unwrap_or_else(|| format!("ws-{}", uuid::Uuid::new_v4())),
    );
    state
        .session_service
        .register(
            &auth.identity,
            &session_id,
            &auth.credential_ref,
            auth.expiry_time,
        )
        .await?;

    let ctx = ConnectionContext {
        identity: auth.identity,
        session_id,
    };
    let event_rx = state.event_bus.subscribe();
    let dispatcher = Arc::new(Dispatcher::new(state));

    Ok(ws.on_upgrade(move |socket| run_connection(socket, event_rx, dispatcher, ctx)))
}
