//! Collaboration rows: invites, collaborators, comments, reactions
//! (spec §4.9). All scoped under a `(resource_type, resource_id)` pair,
//! since a goal, quest, or guild can each be shared/discussed the same way.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use questforge_core::ids::{CommentId, InviteId, TypedId, UserId};
use questforge_core::store::{keys, Item};

use super::now_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteStatus {
    Pending,
    Accepted,
    Declined,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invite {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub id: TypedId<InviteId>,
    pub resource_type: String,
    pub resource_id: String,
    pub inviter_id: TypedId<UserId>,
    pub invitee_id: TypedId<UserId>,
    pub status: InviteStatus,
    /// Epoch ms; invites past this instant read as `Expired` without a
    /// separate background sweep (spec §4.9: lazily-evaluated TTL).
    pub expires_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Invite {
    pub fn new(
        resource_type: String,
        resource_id: String,
        inviter_id: TypedId<UserId>,
        invitee_id: TypedId<UserId>,
        ttl_ms: i64,
    ) -> Self {
        let now = now_ms();
        Self {
            entity_type: "Invite".to_string(),
            id: TypedId::new(),
            resource_type,
            resource_id,
            inviter_id,
            invitee_id,
            status: InviteStatus::Pending,
            expires_at: now + ttl_ms,
            created_at: now,
            updated_at: now,
        }
    }

    /// Effective status as of `now_ms`: a `Pending` invite past its TTL
    /// reads as `Expired` even if no write has touched the row yet.
    pub fn effective_status(&self, now_ms: i64) -> InviteStatus {
        if self.status == InviteStatus::Pending && now_ms >= self.expires_at {
            InviteStatus::Expired
        } else {
            self.status
        }
    }

    pub fn item(&self) -> Item {
        let (pk, sk) = keys::collaboration_invite(&self.resource_type, &self.resource_id, self.id.as_str());
        let (gsi1_pk, gsi1_sk) = keys::collaboration_invite_gsi1(
            self.invitee_id.as_str(),
            status_str(self.status),
            self.created_at,
        );
        let mut keys_map = HashMap::new();
        keys_map.insert("pk", pk);
        keys_map.insert("sk", sk);
        keys_map.insert("gsi1pk", gsi1_pk);
        keys_map.insert("gsi1sk", gsi1_sk);
        questforge_core::store::marshal(self, keys_map)
    }
}

fn status_str(status: InviteStatus) -> &'static str {
    match status {
        InviteStatus::Pending => "pending",
        InviteStatus::Accepted => "accepted",
        InviteStatus::Declined => "declined",
        InviteStatus::Expired => "expired",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collaborator {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub resource_type: String,
    pub resource_id: String,
    pub user_id: TypedId<UserId>,
    pub joined_at: i64,
}

impl Collaborator {
    pub fn new(resource_type: String, resource_id: String, user_id: TypedId<UserId>) -> Self {
        Self {
            entity_type: "Collaborator".to_string(),
            resource_type,
            resource_id,
            user_id,
            joined_at: now_ms(),
        }
    }

    pub fn item(&self) -> Item {
        let (pk, sk) = keys::collaborator(&self.resource_type, &self.resource_id, self.user_id.as_str());
        let (gsi1_pk, gsi1_sk) =
            keys::collaborator_gsi1(self.user_id.as_str(), &self.resource_type, self.joined_at);
        let mut keys_map = HashMap::new();
        keys_map.insert("pk", pk);
        keys_map.insert("sk", sk);
        keys_map.insert("gsi1pk", gsi1_pk);
        keys_map.insert("gsi1sk", gsi1_sk);
        questforge_core::store::marshal(self, keys_map)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub id: TypedId<CommentId>,
    pub resource_type: String,
    pub resource_id: String,
    pub author_id: TypedId<UserId>,
    pub body: String,
    /// User ids extracted from `@nickname` mentions in `body` at write
    /// time (spec §4.9), so notification fan-out never re-parses text.
    pub mentions: Vec<TypedId<UserId>>,
    pub created_at: i64,
}

impl Comment {
    pub fn new(
        resource_type: String,
        resource_id: String,
        author_id: TypedId<UserId>,
        body: String,
        mentions: Vec<TypedId<UserId>>,
    ) -> Self {
        Self {
            entity_type: "Comment".to_string(),
            id: TypedId::new(),
            resource_type,
            resource_id,
            author_id,
            body,
            mentions,
            created_at: now_ms(),
        }
    }

    pub fn item(&self) -> Item {
        let (pk, sk) =
            keys::comment(&self.resource_type, &self.resource_id, self.created_at, self.id.as_str());
        let mut keys_map = HashMap::new();
        keys_map.insert("pk", pk);
        keys_map.insert("sk", sk);
        questforge_core::store::marshal(self, keys_map)
    }
}

/// Extracts `@nickname` tokens from a comment body. A leading `@` followed
/// by alphanumerics/`_`/`-` counts as a mention; duplicates are collapsed.
pub fn extract_mentions(body: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for token in body.split_whitespace() {
        let Some(rest) = token.strip_prefix('@') else { continue };
        let nickname: String = rest
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
            .collect();
        if !nickname.is_empty() && !seen.contains(&nickname) {
            seen.push(nickname);
        }
    }
    seen
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaction {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub comment_id: TypedId<CommentId>,
    pub user_id: TypedId<UserId>,
    pub emoji: String,
    pub created_at: i64,
}

impl Reaction {
    pub fn new(comment_id: TypedId<CommentId>, user_id: TypedId<UserId>, emoji: String) -> Self {
        Self {
            entity_type: "Reaction".to_string(),
            comment_id,
            user_id,
            emoji,
            created_at: now_ms(),
        }
    }

    pub fn item(&self) -> Item {
        let (pk, sk) = keys::reaction(self.comment_id.as_str(), self.user_id.as_str(), &self.emoji);
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
    fn pending_invite_past_ttl_reads_expired() {
        let invite = Invite::new("goal".into(), "g1".into(), TypedId::new(), TypedId::new(), 1000);
        assert_eq!(invite.effective_status(invite.created_at), InviteStatus::Pending);
        assert_eq!(invite.effective_status(invite.expires_at + 1), InviteStatus::Expired);
    }

    #[test]
    fn extract_mentions_dedupes_and_stops_at_punctuation() {
        let mentions = extract_mentions("hey @ada and @bob, also @ada again!");
        assert_eq!(mentions, vec!["ada".to_string(), "bob".to_string()]);
    }
}
