use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::rate_limit::Endpoint;
use crate::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use engine::events::UserEvent;
use futures::{sink::SinkExt, stream::StreamExt};
use serde_json::json;
use tokio::sync::broadcast;
use types::ids::UserId;

/// Upgrade to the per-user private channel `user.{user_id}`. Only events
/// addressed to the authenticated user are forwarded.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Response, AppError> {
    state.rate_limiter.check(user.user_id, Endpoint::WsConnect)?;

    let rx = state.publisher.subscribe();
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, rx, user.user_id)))
}

async fn handle_socket(
    socket: WebSocket,
    mut rx: broadcast::Receiver<UserEvent>,
    user_id: UserId,
) {
    let channel = format!("user.{user_id}");
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) if event.user_id == user_id => {
                    let frame = json!({
                        "channel": channel,
                        "event": event.event,
                        "data": event.payload,
                    });
                    if sender.send(Message::Text(frame.to_string())).await.is_err() {
                        break;
                    }
                }
                Ok(_) => {} // someone else's event
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(%user_id, skipped, "websocket subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            msg = receiver.next() => match msg {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {} // clients only listen on this channel
                Some(Err(_)) => break,
            },
        }
    }
}
