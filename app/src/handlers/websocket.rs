//! `GET /ws` — live chat fan-out (spec §4.10). Outside the REST authz/Cedar
//! stack (browsers can't set `Authorization` on a WebSocket upgrade), so the
//! bearer token travels as `?token=` and is checked against the same
//! [`Authorizer`] before the upgrade completes.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use questforge_core::websocket::{ConnectionDisconnected, ConnectionId, JoinRoomRequest, LeaveRoomRequest, RoomMember};

use crate::principal_user_id;
use crate::AppState;

#[derive(Deserialize)]
pub struct WsAuthQuery {
    token: String,
}

pub async fn ws_handler(
    State(state): State<AppState>,
    Query(auth): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let principal = match state.authorizer.authorize(&auth.token).await {
        Ok(principal) => principal,
        Err(_) => return StatusCode::UNAUTHORIZED.into_response(),
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, principal.sub))
}

/// Client -> server frames. `send` targets either a `room_id` or `guild_id`,
/// never both; `MessagingService` enforces guild membership, rooms are open
/// to any authenticated connection that joins.
#[derive(Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ClientFrame {
    Join { room_id: String },
    Leave { room_id: String },
    SendRoom { room_id: String, body: String },
    SendGuild { guild_id: String, body: String },
}

async fn handle_socket(socket: WebSocket, state: AppState, sub: String) {
    let connection_id = ConnectionId::new();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Message>(64);
    let member = RoomMember::authenticated(connection_id, outbound_tx, sub.clone());

    let (mut sink, mut stream) = socket.split();

    let forward = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => {
                if let Err(err) = dispatch(&state, &sub, connection_id, &member, &text).await {
                    tracing::debug!(connection_id = %connection_id, %err, "dropping malformed websocket frame");
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    state
        .rooms
        .connection_disconnected(ConnectionDisconnected::new(connection_id))
        .await;
    forward.abort();
}

async fn dispatch(
    state: &AppState,
    sub: &str,
    connection_id: ConnectionId,
    member: &RoomMember,
    text: &str,
) -> Result<(), questforge_core::error::Error> {
    let frame: ClientFrame =
        serde_json::from_str(text).map_err(|e| questforge_core::error::Error::validation_field("frame", e.to_string()))?;

    match frame {
        ClientFrame::Join { room_id } => {
            state.rooms.join_room(JoinRoomRequest::new(room_id, member.clone())).await;
        }
        ClientFrame::Leave { room_id } => {
            state.rooms.leave_room(LeaveRoomRequest::new(room_id, connection_id)).await;
        }
        ClientFrame::SendRoom { room_id, body } => {
            let sender_id = principal_user_id(sub)?;
            state.messaging.send_room_message(&room_id, sender_id, body).await?;
        }
        ClientFrame::SendGuild { guild_id, body } => {
            let sender_id = principal_user_id(sub)?;
            state.messaging.send_guild_message(&guild_id, sender_id, body).await?;
        }
    }
    Ok(())
}
