//! WebSocket Connection Handler
//!
//! Upgrades `/ws/{token}`, replays the public history, attaches the
//! connection to its session and pumps frames between the socket and the
//! message router.

use std::time::Duration;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::interval;

use super::messages::{CloseReason, InboundMessage, Outbound};
use super::session::SessionState;
use crate::application::services::MessageError;
use crate::startup::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(token): Path<String>,
    State(state): State<AppState>,
) -> Response {
    let limits = &state.settings.websocket;
    ws.max_message_size(limits.max_message_size)
        .max_frame_size(limits.max_frame_size)
        .on_upgrade(move |socket| handle_socket(socket, state, token))
}

/// Handle individual WebSocket connection
async fn handle_socket(mut socket: WebSocket, state: AppState, token: String) {
    let (tx, rx) = mpsc::unbounded_channel::<Outbound>();

    // History goes on the queue before the connection is registered, so it
    // is written ahead of every live event.
    match state.messages.replay_history(&token, &tx).await {
        Ok(count) => tracing::debug!(count = count, "History queued"),
        Err(MessageError::InvalidSession) => {
            tracing::debug!("Rejecting WebSocket: session not active");
            let _ = socket
                .send(close_message(CloseReason::InvalidSession))
                .await;
            return;
        }
        Err(e) => tracing::warn!(error = %e, "Failed to load history for new connection"),
    }

    let connection = match state.sessions.attach(&token, tx).await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::debug!(error = %e, "Rejecting WebSocket: session not active");
            let _ = socket
                .send(close_message(CloseReason::InvalidSession))
                .await;
            return;
        }
    };

    let mut session_state = SessionState::new(connection.id(), connection.user_id());
    tracing::info!(
        user_id = connection.user_id(),
        connection_id = %connection.id(),
        "User connected"
    );

    // Split socket for concurrent read/write
    let (sender, mut receiver) = socket.split();
    let mut writer = tokio::spawn(write_outbound(sender, rx));

    let idle_timeout = state.settings.websocket.idle_timeout();
    let mut idle_check = interval(
        idle_timeout
            .map(|t| t / 2)
            .unwrap_or(Duration::from_secs(60)),
    );
    idle_check.tick().await; // Skip first immediate tick

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        session_state.touch();
                        let inbound = InboundMessage::parse(text.as_str());
                        match state.messages.send(connection.token(), inbound).await {
                            Ok(_) => {}
                            Err(MessageError::InvalidSession) => {
                                tracing::info!(
                                    connection_id = %connection.id(),
                                    "Session no longer active, closing connection"
                                );
                                connection.close(CloseReason::InvalidSession);
                            }
                            Err(e) => {
                                tracing::debug!(
                                    connection_id = %connection.id(),
                                    error = %e,
                                    "Inbound message discarded"
                                );
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!(connection_id = %connection.id(), "Connection closed by client");
                        break;
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                        // Pong is handled automatically by axum
                        session_state.touch();
                    }
                    Some(Ok(Message::Binary(_))) => {
                        session_state.touch();
                        tracing::trace!(connection_id = %connection.id(), "Ignoring binary frame");
                    }
                    Some(Err(e)) => {
                        tracing::debug!(connection_id = %connection.id(), error = %e, "WebSocket error");
                        break;
                    }
                }
            }

            // Writer stops after a server-side close or a failed write
            _ = &mut writer => {
                break;
            }

            _ = idle_check.tick(), if idle_timeout.is_some() => {
                if idle_timeout.is_some_and(|t| session_state.is_idle(t)) {
                    tracing::info!(
                        connection_id = %connection.id(),
                        frames = session_state.frames_received,
                        "Idle timeout, closing connection"
                    );
                    connection.close(CloseReason::IdleTimeout);
                }
            }
        }
    }

    if let Err(e) = state.sessions.detach(&connection).await {
        tracing::error!(
            connection_id = %connection.id(),
            error = %e,
            "Failed to clean up connection"
        );
    }
    writer.abort();

    tracing::info!(
        user_id = session_state.user_id,
        connection_id = %session_state.connection_id,
        frames = session_state.frames_received,
        "User disconnected"
    );
}

/// Drain the connection's outbound queue into the socket, in order.
async fn write_outbound(
    mut sender: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
) {
    while let Some(item) = rx.recv().await {
        match item {
            Outbound::Event(event) => {
                let text = match serde_json::to_string(&event) {
                    Ok(t) => t,
                    Err(e) => {
                        tracing::error!("Failed to serialize event: {}", e);
                        continue;
                    }
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            Outbound::Close(reason) => {
                let _ = sender.send(close_message(reason)).await;
                break;
            }
        }
    }
}

fn close_message(reason: CloseReason) -> Message {
    Message::Close(Some(CloseFrame {
        code: reason.code(),
        reason: reason.reason().into(),
    }))
}
