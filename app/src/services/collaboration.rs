//! Collaboration Service (C9): invites, collaborators, comments, reactions.
//!
//! Invite rows carry their own GSI1 projection (`USER#<invitee> /
//! INVITE#<status>#<ts>`) via `Invite::item()`, so "the invite projection"
//! named in spec §4.9 is this store's GSI, not a second physical row —
//! accepting/declining an invite keeps it in sync by recomputing `gsi1sk`
//! alongside `status` in the same conditioned update.

use std::collections::HashMap;
use std::sync::Arc;

use questforge_core::error::{Error, Result};
use questforge_core::ids::{CommentId, TypedId, UserId};
use questforge_core::store::{keys, Condition, QueryInput, SetOp, StoreClient, TransactOp};

use crate::entities::collaboration::{Collaborator, Comment, Invite, InviteStatus, Reaction};
use crate::entities::now_ms;

pub use crate::entities::collaboration::extract_mentions;

const INVITE_TTL_MS: i64 = 30 * 24 * 60 * 60 * 1000;
const MAX_COMMENT_BODY_LEN: usize = 4000;

pub struct CollaborationService {
    store: Arc<dyn StoreClient>,
}

impl CollaborationService {
    pub fn new(store: Arc<dyn StoreClient>) -> Self {
        Self { store }
    }

    /// Membership check for a `(resource_type, resource_id)` pair, same
    /// shape as `GuildService::is_member` — used by the `messages` resolver
    /// to gate general (non-guild) room reads on the room's collaborator row.
    pub async fn is_collaborator(&self, resource_type: &str, resource_id: &str, user_id: &str) -> Result<bool> {
        let (pk, sk) = keys::collaborator(resource_type, resource_id, user_id);
        Ok(self.store.get(&pk, &sk).await?.is_some())
    }

    pub async fn send_invite(
        &self,
        resource_type: String,
        resource_id: String,
        inviter_id: TypedId<UserId>,
        invitee_id: TypedId<UserId>,
    ) -> Result<Invite> {
        let invite = Invite::new(resource_type, resource_id, inviter_id, invitee_id, INVITE_TTL_MS);
        let (pk, sk) = keys::collaboration_invite(&invite.resource_type, &invite.resource_id, invite.id.as_str());
        self.store.put(&pk, &sk, invite.item(), None).await?;
        Ok(invite)
    }

    pub async fn accept_invite(&self, resource_type: &str, resource_id: &str, invite_id: &str) -> Result<Collaborator> {
        let invite = self.fetch_invite(resource_type, resource_id, invite_id).await?;
        match invite.effective_status(now_ms()) {
            InviteStatus::Pending => {}
            InviteStatus::Expired => return Err(Error::Gone("invite has expired".into())),
            _ => return Err(Error::Conflict("invite is no longer pending".into())),
        }

        let collaborator = Collaborator::new(resource_type.to_string(), resource_id.to_string(), invite.invitee_id.clone());
        let (invite_pk, invite_sk) = keys::collaboration_invite(resource_type, resource_id, invite_id);
        let (gsi1_pk, gsi1_sk) = keys::collaboration_invite_gsi1(invite.invitee_id.as_str(), "accepted", invite.created_at);
        let (collab_pk, collab_sk) =
            keys::collaborator(resource_type, resource_id, collaborator.user_id.as_str());

        let ops = vec![
            TransactOp::Update {
                pk: invite_pk,
                sk: invite_sk,
                sets: vec![
                    SetOp::Set("status".to_string(), serde_json::json!("accepted")),
                    SetOp::Set("updated_at".to_string(), serde_json::json!(now_ms())),
                    SetOp::Set("gsi1pk".to_string(), serde_json::json!(gsi1_pk)),
                    SetOp::Set("gsi1sk".to_string(), serde_json::json!(gsi1_sk)),
                ],
                condition: Some(Condition::Equals("status".to_string(), serde_json::json!("pending"))),
            },
            TransactOp::Put { pk: collab_pk, sk: collab_sk, item: collaborator.item(), condition: None },
        ];

        self.store.transact_write(ops).await.map_err(|e| match e {
            questforge_core::store::StoreError::Conflict(_) => Error::Conflict("invite is no longer pending".into()),
            other => other.into(),
        })?;

        Ok(collaborator)
    }

    pub async fn decline_invite(&self, resource_type: &str, resource_id: &str, invite_id: &str) -> Result<()> {
        let invite = self.fetch_invite(resource_type, resource_id, invite_id).await?;
        match invite.effective_status(now_ms()) {
            InviteStatus::Pending => {}
            InviteStatus::Expired => return Err(Error::Gone("invite has expired".into())),
            _ => return Err(Error::Conflict("invite is no longer pending".into())),
        }

        let (pk, sk) = keys::collaboration_invite(resource_type, resource_id, invite_id);
        let (gsi1_pk, gsi1_sk) = keys::collaboration_invite_gsi1(invite.invitee_id.as_str(), "declined", invite.created_at);
        self.store
            .update(
                &pk,
                &sk,
                vec![
                    SetOp::Set("status".to_string(), serde_json::json!("declined")),
                    SetOp::Set("updated_at".to_string(), serde_json::json!(now_ms())),
                    SetOp::Set("gsi1pk".to_string(), serde_json::json!(gsi1_pk)),
                    SetOp::Set("gsi1sk".to_string(), serde_json::json!(gsi1_sk)),
                ],
                Some(Condition::Equals("status".to_string(), serde_json::json!("pending"))),
            )
            .await
            .map_err(|e| match e {
                questforge_core::store::StoreError::Conflict(_) => Error::Conflict("invite is no longer pending".into()),
                other => other.into(),
            })?;
        Ok(())
    }

    async fn fetch_invite(&self, resource_type: &str, resource_id: &str, invite_id: &str) -> Result<Invite> {
        let (pk, sk) = keys::collaboration_invite(resource_type, resource_id, invite_id);
        let item = self
            .store
            .get(&pk, &sk)
            .await?
            .ok_or_else(|| Error::NotFound("invite not found".into()))?;
        questforge_core::store::unmarshal(&item)
    }

    /// `mentions` are resolved user ids — nickname-to-id resolution is the
    /// caller's job (the user service owns the nickname GSI), not this
    /// service's; `extract_mentions` only tokenizes the raw `@nickname`
    /// text out of `body`.
    pub async fn add_comment(
        &self,
        resource_type: String,
        resource_id: String,
        author_id: TypedId<UserId>,
        body: String,
        mentions: Vec<TypedId<UserId>>,
    ) -> Result<Comment> {
        if body.is_empty() || body.chars().count() > MAX_COMMENT_BODY_LEN {
            return Err(Error::validation_field("body", "comment must be 1-4000 characters"));
        }
        let comment = Comment::new(resource_type, resource_id, author_id, body, mentions);
        let (pk, sk) = keys::comment(&comment.resource_type, &comment.resource_id, comment.created_at, comment.id.as_str());
        self.store.put(&pk, &sk, comment.item(), None).await?;
        Ok(comment)
    }

    /// `Query(PK=RESOURCE#<type>#<id>, SK begins_with COMMENT#)`.
    pub async fn list_comments(&self, resource_type: &str, resource_id: &str) -> Result<Vec<Comment>> {
        let pk = keys::resource_pk(resource_type, resource_id);
        let result = self
            .store
            .query(QueryInput::new(pk).sk_begins_with("COMMENT#").limit(500))
            .await?;
        result
            .items
            .into_iter()
            .map(|item| questforge_core::store::unmarshal(&item).map_err(Error::from))
            .collect()
    }

    /// Toggle semantics (spec §4.9): a first reaction is recorded; a
    /// different emoji from the same user replaces it; the same emoji
    /// again removes it. Returns the user's resulting reaction, if any.
    pub async fn toggle_reaction(
        &self,
        comment_id: TypedId<CommentId>,
        user_id: TypedId<UserId>,
        emoji: String,
    ) -> Result<Option<Reaction>> {
        let prefix = format!("REACTION#{}#", user_id.as_str());
        let existing = self
            .store
            .query(QueryInput::new(format!("COMMENT#{}", comment_id.as_str())).sk_begins_with(prefix).limit(1))
            .await?;

        if let Some(item) = existing.items.into_iter().next() {
            let reaction: Reaction = questforge_core::store::unmarshal(&item)?;
            let (pk, sk) = keys::reaction(comment_id.as_str(), user_id.as_str(), &reaction.emoji);
            self.store.delete(&pk, &sk, None).await?;
            if reaction.emoji == emoji {
                return Ok(None);
            }
        }

        let reaction = Reaction::new(comment_id, user_id, emoji);
        let (pk, sk) = keys::reaction(reaction.comment_id.as_str(), reaction.user_id.as_str(), &reaction.emoji);
        self.store.put(&pk, &sk, reaction.item(), None).await?;
        Ok(Some(reaction))
    }

    /// `Query(PK=COMMENT#<id>, SK begins_with REACTION#)`, grouped by
    /// emoji (spec §4.9: "counts derived by query, grouped").
    pub async fn reaction_counts(&self, comment_id: &str) -> Result<HashMap<String, u32>> {
        let pk = format!("COMMENT#{comment_id}");
        let result = self
            .store
            .query(QueryInput::new(pk).sk_begins_with("REACTION#").limit(1000))
            .await?;
        let mut counts = HashMap::new();
        for item in result.items {
            let reaction: Reaction = questforge_core::store::unmarshal(&item)?;
            *counts.entry(reaction.emoji).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use questforge_core::store::memory::MemoryStore;

    fn service() -> CollaborationService {
        CollaborationService::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn accepting_invite_creates_collaborator() {
        let svc = service();
        let inviter: TypedId<UserId> = TypedId::new();
        let invitee: TypedId<UserId> = TypedId::new();
        let invite = svc
            .send_invite("goal".into(), "g1".into(), inviter, invitee.clone())
            .await
            .unwrap();

        let collaborator = svc.accept_invite("goal", "g1", invite.id.as_str()).await.unwrap();
        assert_eq!(collaborator.user_id, invitee);
    }

    #[tokio::test]
    async fn accepting_twice_conflicts() {
        let svc = service();
        let invite = svc
            .send_invite("goal".into(), "g1".into(), TypedId::new(), TypedId::new())
            .await
            .unwrap();
        svc.accept_invite("goal", "g1", invite.id.as_str()).await.unwrap();
        let err = svc.accept_invite("goal", "g1", invite.id.as_str()).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn toggle_reaction_replaces_then_removes() {
        let svc = service();
        let comment_id: TypedId<CommentId> = TypedId::new();
        let user_id: TypedId<UserId> = TypedId::new();

        let first = svc.toggle_reaction(comment_id.clone(), user_id.clone(), "👍".into()).await.unwrap();
        assert!(first.is_some());

        let replaced = svc.toggle_reaction(comment_id.clone(), user_id.clone(), "🎉".into()).await.unwrap();
        assert_eq!(replaced.unwrap().emoji, "🎉");

        let removed = svc.toggle_reaction(comment_id.clone(), user_id, "🎉".into()).await.unwrap();
        assert!(removed.is_none());

        let counts = svc.reaction_counts(comment_id.as_str()).await.unwrap();
        assert!(counts.is_empty());
    }
}
