//! WebSocket handler for the live chat session.
//!
//! The `/api/v1/chat/ws` endpoint upgrades an HTTP connection to a
//! WebSocket. Authentication happens before the upgrade via the
//! [`CurrentUser`] extractor; an unresolvable token is rejected with 401 and
//! never joins a channel. Once connected, the session:
//!
//! - **Joins exactly one channel:** admins subscribe to the admin broadcast
//!   channel and see events from every conversation; regular users subscribe
//!   to their own conversation's channel (created on first connect).
//! - **Forwards events:** every [`ChatEvent`] published on the joined
//!   channel is pushed to the client as a JSON text frame.
//! - **Receives messages:** inbound text frames are parsed as
//!   [`InboundFrame`] and dispatched to the chat service. Malformed frames
//!   are logged and ignored; the session stays alive.
//!
//! Lagged receivers (when the client is too slow to keep up) are handled
//! gracefully: the handler logs a warning and continues receiving.
//! Disconnecting drops the receiver, which is the channel leave.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use folio_core::chat::registry::Channel;
use folio_types::identity::UserIdentity;

use crate::http::extractors::auth::CurrentUser;
use crate::state::AppState;

/// Incoming chat frame from a WebSocket client.
///
/// `conversation_id` is the admin's target; it is ignored for regular users,
/// whose messages always land in their own conversation.
#[derive(Debug, serde::Deserialize)]
struct InboundFrame {
    message: String,
    #[serde(default)]
    conversation_id: Option<i64>,
}

/// Upgrade an HTTP request to a WebSocket chat session.
///
/// This is mounted at `/api/v1/chat/ws` in the router.
pub async fn ws_handler(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_chat_session(socket, state, identity))
}

/// Core chat session handler.
///
/// Uses `tokio::select!` to multiplex between receiving events from the
/// connection registry and incoming WebSocket messages from the client. This
/// keeps both sender and receiver in a single task per session.
async fn handle_chat_session(mut socket: WebSocket, state: AppState, identity: UserIdentity) {
    // Resolve the single channel this session belongs to. Regular users get
    // their conversation created here on first connect.
    let channel = if identity.is_admin() {
        Channel::Admin
    } else {
        match state.chat.conversation_for(&identity).await {
            Ok(conversation) => Channel::Conversation(conversation.id),
            Err(err) => {
                tracing::error!(
                    user_id = identity.id,
                    error = %err,
                    "Failed to resolve conversation, closing session"
                );
                let _ = socket.close().await;
                return;
            }
        }
    };

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let mut event_rx = state.registry.subscribe(channel);

    tracing::debug!(
        user_id = identity.id,
        username = %identity.username,
        channel = %channel,
        "Chat session connected"
    );

    loop {
        tokio::select! {
            // --- Branch 1: Forward registry events to the WebSocket client ---
            event_result = event_rx.recv() => {
                match event_result {
                    Ok(event) => {
                        match serde_json::to_string(&event) {
                            Ok(json) => {
                                if ws_sender.send(Message::Text(json.into())).await.is_err() {
                                    // Client disconnected
                                    break;
                                }
                            }
                            Err(err) => {
                                tracing::warn!("Failed to serialize ChatEvent: {err}");
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(
                            skipped = n,
                            channel = %channel,
                            "Chat session lagged, skipping {n} events"
                        );
                        // Continue receiving -- the client misses some events
                        // but recovers history from the view endpoints.
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }

            // --- Branch 2: Process messages from the WebSocket client ---
            msg_result = ws_receiver.next() => {
                match msg_result {
                    Some(Ok(Message::Text(text))) => {
                        process_frame(&text, &state, &identity).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        // Client disconnected
                        break;
                    }
                    Some(Err(err)) => {
                        tracing::debug!("WebSocket receive error: {err}");
                        break;
                    }
                    // Ignore binary, ping, pong protocol frames (handled by axum/tungstenite)
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    tracing::debug!(user_id = identity.id, channel = %channel, "Chat session closed");
}

/// Parse and dispatch a single inbound frame.
///
/// Malformed JSON and frames without a `message` key are logged and ignored.
/// Persistence failures end up here too: the session survives, the message
/// is simply not delivered.
async fn process_frame(text: &str, state: &AppState, identity: &UserIdentity) {
    let frame: InboundFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(err) => {
            tracing::warn!(
                raw = %text,
                error = %err,
                "Ignoring malformed chat frame"
            );
            return;
        }
    };

    let result = if identity.is_admin() {
        match frame.conversation_id {
            Some(conversation_id) => {
                state
                    .chat
                    .send_admin_message(identity, conversation_id, &frame.message)
                    .await
            }
            None => {
                tracing::warn!("Dropping admin frame without conversation_id");
                return;
            }
        }
    } else {
        state.chat.send_user_message(identity, &frame.message).await
    };

    if let Err(err) = result {
        tracing::error!(
            user_id = identity.id,
            error = %err,
            "Failed to persist chat message"
        );
    }
}
