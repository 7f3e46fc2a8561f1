//! WebSocket connection state machine.
//!
//! Runs the read/write loop for a single connection: decodes inbound
//! command envelopes, checks for a duplicate-login takeover before every
//! command, forwards room-filtered events from the bus, and removes the
//! session registration on disconnect.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::dispatcher::{ConnectionContext, Dispatcher};
use super::messages::{WsCommand, WsMessage, WsMessageType};
use super::subscription::SubscriptionManager;
use crate::domain::RoomEvent;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and dispatches them.
/// - Forwards matching events from the [`broadcast::Receiver`] to the
///   client.
/// - Closes the connection with a "superseded" notice when another login
///   took over this identity.
pub async fn run_connection(
    socket: WebSocket,
    mut event_rx: broadcast::Receiver<RoomEvent>,
    dispatcher: Arc<Dispatcher>,
    ctx: ConnectionContext,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();

    loop {
        tokio::select! {
            // Incoming message from client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match dispatcher
                            .session_service()
                            .termination_signal(&ctx.identity, &ctx.session_id)
                            .await
                        {
                            Ok(Some(superseded_by)) => {
                                let notice = WsMessage {
                                    id: uuid::Uuid::new_v4().to_string(),
                                    msg_type: WsMessageType::Error,
                                    timestamp: Utc::now(),
                                    payload: serde_json::json!({
                                        "reason": "superseded",
                                        "superseded_by": superseded_by.as_str(),
                                    }),
                                };
                                let json = serde_json::to_string(&notice).unwrap_or_default();
                                let _ = ws_tx.send(Message::text(json)).await;
                                tracing::info!(
                                    identity = %ctx.identity,
                                    session = %ctx.session_id,
                                    "connection superseded by another login"
                                );
                                break;
                            }
                            Ok(None) => {}
                            Err(e) => {
                                tracing::warn!(error = %e, "termination check failed");
                            }
                        }

                        let response =
                            handle_text_message(&dispatcher, &ctx, &text, &mut subs).await;
                        if let Some(resp_json) = response
                            && ws_tx.send(Message::text(resp_json)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            // Event from EventBus
            event = event_rx.recv() => {
                match event {
                    Ok(room_event) => {
                        let deliver = room_event
                            .room_id()
                            .is_some_and(|id| subs.matches(id));
                        if deliver {
                            let msg = WsMessage {
                                id: uuid::Uuid::new_v4().to_string(),
                                msg_type: WsMessageType::Event,
                                timestamp: Utc::now(),
                                payload: serde_json::to_value(&room_event).unwrap_or_default(),
                            };
                            let json = serde_json::to_string(&msg).unwrap_or_default();
                            if ws_tx.send(Message::text(json)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws client lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    if let Err(e) = dispatcher
        .session_service()
        .remove(&ctx.identity, &ctx.session_id)
        .await
    {
        tracing::warn!(error = %e, "session cleanup failed on disconnect");
    }
    tracing::debug!(identity = %ctx.identity, session = %ctx.session_id, "ws connection closed");
}

/// Handles a text frame: envelope decode → command decode → dispatch.
/// Returns an optional JSON response for the issuing client.
async fn handle_text_message(
    dispatcher: &Dispatcher,
    ctx: &ConnectionContext,
    text: &str,
    subs: &mut SubscriptionManager,
) -> Option<String> {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        let err = WsMessage {
            id: String::new(),
            msg_type: WsMessageType::Error,
            timestamp: Utc::now(),
            payload: serde_json::json!({
                "code": 400,
                "message": "malformed JSON"
            }),
        };
        return serde_json::to_string(&err).ok();
    };

    let Ok(command) = serde_json::from_value::<WsCommand>(msg.payload.clone()) else {
        let err = WsMessage {
            id: msg.id,
            msg_type: WsMessageType::Error,
            timestamp: Utc::now(),
            payload: serde_json::json!({
                "code": 404,
                "message": "unknown command"
            }),
        };
        return serde_json::to_string(&err).ok();
    };

    let response = dispatcher.dispatch(ctx, &msg.id, command, subs).await?;
    serde_json::to_string(&response).ok()
}
