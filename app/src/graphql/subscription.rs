//! Subscription root (spec §4.12): `onMessage(roomId)` rides the exact same
//! room-manager fan-out the `/ws` handler uses, joining as a member whose
//! outbound channel feeds the GraphQL stream instead of a socket.

use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

use async_graphql::{Context, FieldResult, Subscription};
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use questforge_core::websocket::{
    ConnectionDisconnected, ConnectionId, JoinRoomRequest, Message as WsMessage, RoomMember,
    SharedRoomManager,
};

use crate::entities::messaging::ChatMessage;
use crate::graphql::context::require_principal;
use crate::graphql::types::ChatMessageNode;
use crate::AppState;

struct RoomSubscriptionGuard {
    rooms: SharedRoomManager,
    connection_id: ConnectionId,
}

impl Drop for RoomSubscriptionGuard {
    fn drop(&mut self) {
        let rooms = self.rooms.clone();
        let connection_id = self.connection_id;
        tokio::spawn(async move {
            rooms.connection_disconnected(ConnectionDisconnected::new(connection_id)).await;
        });
    }
}

struct RoomMessageStream {
    inner: ReceiverStream<WsMessage>,
    _guard: RoomSubscriptionGuard,
}

impl Stream for RoomMessageStream {
    type Item = ChatMessageNode;

    fn poll_next(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(WsMessage::Text(text))) => {
                    if let Ok(message) = serde_json::from_str::<ChatMessage>(&text) {
                        return Poll::Ready(Some(message.into()));
                    }
                }
                Poll::Ready(Some(_)) => {}
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

pub struct SubscriptionRoot;

#[Subscription]
impl SubscriptionRoot {
    async fn on_message(&self, ctx: &Context<'_>, room_id: String) -> FieldResult<impl Stream<Item = ChatMessageNode>> {
        let p = require_principal(ctx)?.clone();
        let state = ctx.data::<AppState>()?.clone();
        if !state.collaboration.is_collaborator("room", &room_id, &p.sub).await? {
            return Err(questforge_core::error::Error::Forbidden("not a member of this room".into()).into());
        }

        let connection_id = ConnectionId::new();
        let (tx, rx) = mpsc::channel::<WsMessage>(32);
        let member = RoomMember::authenticated(connection_id, tx, p.sub);
        state.rooms.join_room(JoinRoomRequest::new(room_id, member)).await;

        Ok(RoomMessageStream {
            inner: ReceiverStream::new(rx),
            _guard: RoomSubscriptionGuard { rooms: state.rooms.clone(), connection_id },
        })
    }
}
