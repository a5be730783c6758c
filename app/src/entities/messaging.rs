//! Chat message rows (spec §4.10): a room message lives under
//! `ROOM#<roomId> / MSG#<ts>#<id>`, a guild message under
//! `GUILD#<guildId> / MSG#<ts>#<id>` — same shape, different scope.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use questforge_core::ids::{MessageId, TypedId, UserId};
use questforge_core::store::{keys, Item};

use super::now_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatScope {
    Room,
    Guild,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub id: TypedId<MessageId>,
    pub scope: ChatScope,
    /// Room id or guild id depending on `scope`.
    pub scope_id: String,
    pub sender_id: TypedId<UserId>,
    pub body: String,
    pub created_at: i64,
}

impl ChatMessage {
    pub fn new_room(room_id: String, sender_id: TypedId<UserId>, body: String) -> Self {
        Self::new(ChatScope::Room, room_id, sender_id, body)
    }

    pub fn new_guild(guild_id: String, sender_id: TypedId<UserId>, body: String) -> Self {
        Self::new(ChatScope::Guild, guild_id, sender_id, body)
    }

    fn new(scope: ChatScope, scope_id: String, sender_id: TypedId<UserId>, body: String) -> Self {
        Self {
            entity_type: "ChatMessage".to_string(),
            id: TypedId::new(),
            scope,
            scope_id,
            sender_id,
            body,
            created_at: now_ms(),
        }
    }

    pub fn item(&self) -> Item {
        let (pk, sk) = match self.scope {
            ChatScope::Room => keys::room_chat_message(&self.scope_id, self.created_at, self.id.as_str()),
            ChatScope::Guild => keys::guild_chat_message(&self.scope_id, self.created_at, self.id.as_str()),
        };
        let mut keys_map = HashMap::new();
        keys_map.insert("pk", pk);
        keys_map.insert("sk", sk);
        questforge_core::store::marshal(self, keys_map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_and_guild_messages_use_distinct_partitions() {
        let room_msg = ChatMessage::new_room("r1".into(), TypedId::new(), "hi".into());
        let guild_msg = ChatMessage::new_guild("g1".into(), TypedId::new(), "hi".into());
        let room_item = room_msg.item();
        let guild_item = guild_msg.item();
        assert_eq!(room_item.get("pk").unwrap().as_str().unwrap(), "ROOM#r1");
        assert_eq!(guild_item.get("pk").unwrap().as_str().unwrap(), "GUILD#g1");
    }
}
