//! Messaging Service (C10): persists chat messages and fans them out over
//! the live WebSocket rooms (spec §4.10). Guild-scoped chat is gated on
//! guild membership; general rooms accept any authenticated sender.

use std::sync::Arc;

use questforge_core::error::{Error, Result};
use questforge_core::ids::{TypedId, UserId};
use questforge_core::store::{keys, Index, QueryInput, SkCondition, StoreClient};
use questforge_core::websocket::{BroadcastToRoom, Message as WsMessage, SharedRoomManager};

use crate::entities::messaging::{ChatMessage, ChatScope};
use crate::services::GuildService;

const MAX_BODY_LEN: usize = 4000;
const DEFAULT_HISTORY_LIMIT: usize = 50;

pub struct MessagingService {
    store: Arc<dyn StoreClient>,
    rooms: SharedRoomManager,
    guilds: Arc<GuildService>,
}

impl MessagingService {
    pub fn new(store: Arc<dyn StoreClient>, rooms: SharedRoomManager, guilds: Arc<GuildService>) -> Self {
        Self { store, rooms, guilds }
    }

    pub async fn send_room_message(
        &self,
        room_id: &str,
        sender_id: TypedId<UserId>,
        body: String,
    ) -> Result<ChatMessage> {
        validate_body(&body)?;
        let message = ChatMessage::new_room(room_id.to_string(), sender_id, body);
        self.persist_and_broadcast(room_id, message).await
    }

    pub async fn send_guild_message(
        &self,
        guild_id: &str,
        sender_id: TypedId<UserId>,
        body: String,
    ) -> Result<ChatMessage> {
        validate_body(&body)?;
        if !self.guilds.is_member(guild_id, sender_id.as_str()).await? {
            return Err(Error::Forbidden("not a member of this guild".into()));
        }
        let message = ChatMessage::new_guild(guild_id.to_string(), sender_id, body);
        self.persist_and_broadcast(guild_id, message).await
    }

    async fn persist_and_broadcast(&self, broadcast_room: &str, message: ChatMessage) -> Result<ChatMessage> {
        let (pk, sk) = match message.scope {
            ChatScope::Room => keys::room_chat_message(&message.scope_id, message.created_at, message.id.as_str()),
            ChatScope::Guild => keys::guild_chat_message(&message.scope_id, message.created_at, message.id.as_str()),
        };
        self.store.put(&pk, &sk, message.item(), None).await?;

        let payload = serde_json::to_string(&message).unwrap_or_default();
        self.rooms
            .broadcast_to_room(BroadcastToRoom::new(broadcast_room, WsMessage::Text(payload.into())))
            .await;

        Ok(message)
    }

    /// `Query(PK=ROOM#<id>, SK begins_with MSG#, limit, forward=false)`,
    /// optionally bounded below by `after` (an opaque `ts#id` cursor) for
    /// forward pagination of older-to-newer pages.
    pub async fn room_history(&self, room_id: &str, after: Option<String>, limit: Option<usize>) -> Result<Vec<ChatMessage>> {
        self.history(keys::room_pk(room_id), after, limit).await
    }

    pub async fn guild_history(&self, guild_id: &str, after: Option<String>, limit: Option<usize>) -> Result<Vec<ChatMessage>> {
        self.history(keys::guild_pk(guild_id), after, limit).await
    }

    async fn history(&self, pk: String, after: Option<String>, limit: Option<usize>) -> Result<Vec<ChatMessage>> {
        let mut input = QueryInput::new(pk)
            .on_index(Index::Primary)
            .limit(limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
            .forward(false);
        input = match after {
            Some(cursor) => input.sk(SkCondition::Gt(format!("MSG#{cursor}"))),
            None => input.sk_begins_with("MSG#"),
        };
        let result = self.store.query(input).await?;
        result
            .items
            .into_iter()
            .map(|item| questforge_core::store::unmarshal(&item).map_err(Error::from))
            .collect()
    }
}

fn validate_body(body: &str) -> Result<()> {
    if body.is_empty() || body.chars().count() > MAX_BODY_LEN {
        return Err(Error::validation_field("body", "message must be 1-4000 characters"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use questforge_core::config::GuildAnalyticsConfig;
    use questforge_core::store::memory::MemoryStore;
    use questforge_core::websocket::{RoomConfig, RoomManager};

    fn service() -> MessagingService {
        let store: Arc<dyn StoreClient> = Arc::new(MemoryStore::new());
        let rooms = Arc::new(RoomManager::spawn(RoomConfig {
            enabled: true,
            max_members: 10,
            max_rooms_per_connection: 10,
            idle_timeout_secs: 3600,
        }));
        let guilds = Arc::new(GuildService::new(store.clone(), GuildAnalyticsConfig::default()));
        MessagingService::new(store, rooms, guilds)
    }

    #[tokio::test]
    async fn sending_then_listing_room_history_returns_the_message() {
        let svc = service();
        let sender: TypedId<UserId> = TypedId::new();
        svc.send_room_message("room-1", sender, "hello".into()).await.unwrap();

        let history = svc.room_history("room-1", None, None).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].body, "hello");
    }

    #[tokio::test]
    async fn empty_body_is_rejected() {
        let svc = service();
        let err = svc.send_room_message("room-1", TypedId::new(), "".into()).await.unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[tokio::test]
    async fn non_member_cannot_send_guild_message() {
        let svc = service();
        let owner: TypedId<UserId> = TypedId::new();
        let guild = svc.guilds.create_guild(owner, "Ironforge".into(), "desc".into()).await.unwrap();

        let outsider: TypedId<UserId> = TypedId::new();
        let err = svc
            .send_guild_message(guild.id.as_str(), outsider, "hi".into())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }
}
