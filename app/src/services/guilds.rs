//! Guild Service (C8): membership, guild quests, activity feed, and the
//! on-demand weighted member-activity analytic.

use std::str::FromStr;
use std::sync::Arc;

use questforge_core::config::GuildAnalyticsConfig;
use questforge_core::error::{Error, Result};
use questforge_core::ids::{GuildId, IdKind, QuestId, TypedId, UserId};
use questforge_core::store::{keys, Condition, QueryInput, SetOp, StoreClient, TransactOp};

use crate::entities::guild::{
    aggregate_guild_quest, Guild, GuildActivity, GuildMembership, GuildQuest, GuildQuestAggregation,
    GuildQuestCompletion, GuildRole,
};
use crate::entities::now_ms;

const DEFAULT_ACTIVITY_LIMIT: usize = 50;

/// Parses a typed id out of a plain key-string argument, for entity
/// constructors that need the typed form. A bad id here means the caller
/// passed a malformed path/body parameter, not a store inconsistency.
fn parse_id<K: IdKind>(s: &str) -> Result<TypedId<K>> {
    TypedId::from_str(s).map_err(|_| Error::validation_field("id", "malformed identifier"))
}

pub struct GuildService {
    store: Arc<dyn StoreClient>,
    analytics: GuildAnalyticsConfig,
}

pub struct GuildAnalytics {
    pub active_members: u32,
    pub total_members: u32,
    pub recent_activities: u32,
    pub completed_goals_by_members: u32,
    pub weighted_rate: f64,
}

impl GuildService {
    pub fn new(store: Arc<dyn StoreClient>, analytics: GuildAnalyticsConfig) -> Self {
        Self { store, analytics }
    }

    /// Writes the guild row plus the founding owner membership in one
    /// transaction (spec §4.8).
    pub async fn create_guild(&self, owner_id: TypedId<UserId>, name: String, description: String) -> Result<Guild> {
        if name.trim().is_empty() {
            return Err(Error::validation_field("name", "guild name must not be empty"));
        }
        let guild = Guild::new(name, description, owner_id.clone());
        let membership = GuildMembership::new(guild.id.clone(), owner_id, GuildRole::Owner);

        let (guild_pk, guild_sk) = keys::guild(guild.id.as_str());
        let (member_pk, member_sk) = keys::guild_membership(guild.id.as_str(), membership.user_id.as_str());

        let ops = vec![
            TransactOp::Put { pk: guild_pk, sk: guild_sk, item: guild.item(), condition: None },
            TransactOp::Put { pk: member_pk, sk: member_sk, item: membership.item(), condition: None },
        ];
        self.store.transact_write(ops).await?;
        Ok(guild)
    }

    pub async fn get_guild(&self, guild_id: &str) -> Result<Guild> {
        let (pk, sk) = keys::guild(guild_id);
        let item = self
            .store
            .get(&pk, &sk)
            .await?
            .ok_or_else(|| Error::NotFound("guild not found".into()))?;
        questforge_core::store::unmarshal(&item)
    }

    /// Join writes a membership row, bumps `member_count`, and emits an
    /// activity row (spec §4.8).
    pub async fn join(&self, guild_id: &str, user_id: TypedId<UserId>) -> Result<()> {
        let guild_typed: TypedId<GuildId> = parse_id(guild_id)?;
        let membership = GuildMembership::new(guild_typed, user_id.clone(), GuildRole::Member);
        let (member_pk, member_sk) = keys::guild_membership(guild_id, user_id.as_str());

        self.store
            .put(
                &member_pk,
                &member_sk,
                membership.item(),
                Some(Condition::AttributeNotExists("pk".to_string())),
            )
            .await
            .map_err(|e| match e {
                questforge_core::store::StoreError::Conflict(_) => {
                    Error::Conflict("already a member of this guild".into())
                }
                other => other.into(),
            })?;

        let (guild_pk, guild_sk) = keys::guild(guild_id);
        self.store
            .update(
                &guild_pk,
                &guild_sk,
                vec![
                    SetOp::Increment("member_count".to_string(), 1),
                    SetOp::Set("updated_at".to_string(), serde_json::json!(now_ms())),
                ],
                Some(Condition::AttributeExists("pk".to_string())),
            )
            .await?;

        self.record_activity(guild_id, user_id, "joined", "joined the guild").await?;
        Ok(())
    }

    /// Leave removes the membership row, decrements `member_count`, emits
    /// an activity row.
    pub async fn leave(&self, guild_id: &str, user_id: &str) -> Result<()> {
        let (member_pk, member_sk) = keys::guild_membership(guild_id, user_id);
        self.store.delete(&member_pk, &member_sk, None).await?;

        let (guild_pk, guild_sk) = keys::guild(guild_id);
        self.store
            .update(
                &guild_pk,
                &guild_sk,
                vec![
                    SetOp::Increment("member_count".to_string(), -1),
                    SetOp::Set("updated_at".to_string(), serde_json::json!(now_ms())),
                ],
                Some(Condition::AttributeExists("pk".to_string())),
            )
            .await?;

        self.record_activity(guild_id, parse_id(user_id)?, "left", "left the guild")
            .await?;
        Ok(())
    }

    pub async fn is_member(&self, guild_id: &str, user_id: &str) -> Result<bool> {
        let (pk, sk) = keys::guild_membership(guild_id, user_id);
        Ok(self.store.get(&pk, &sk).await?.is_some())
    }

    /// `Query(PK=GUILD#<id>, SK begins_with MEMBER#)`.
    pub async fn list_members(&self, guild_id: &str) -> Result<Vec<GuildMembership>> {
        let pk = keys::guild_pk(guild_id);
        let result = self
            .store
            .query(QueryInput::new(pk).sk_begins_with("MEMBER#").limit(500))
            .await?;
        result
            .items
            .into_iter()
            .map(|item| questforge_core::store::unmarshal(&item).map_err(Error::from))
            .collect()
    }

    pub async fn add_guild_quest(
        &self,
        guild_id: TypedId<GuildId>,
        quest_id: TypedId<QuestId>,
        title: String,
        aggregation: GuildQuestAggregation,
        target_count: Option<u32>,
    ) -> Result<GuildQuest> {
        let guild_quest = GuildQuest::new(guild_id, quest_id, title, aggregation, target_count);
        let (pk, sk) = keys::guild_quest(guild_quest.guild_id.as_str(), guild_quest.quest_id.as_str());
        self.store.put(&pk, &sk, guild_quest.item(), None).await?;
        Ok(guild_quest)
    }

    /// Records (upserts) one member's contribution to a guild quest. For
    /// quantitative aggregation, rejects with `Validation` when this write
    /// would push the summed completion count past `target_count` (spec §3:
    /// "`completion_count <= target_count` is checked on every completion
    /// write").
    pub async fn record_completion(
        &self,
        guild_id: &str,
        quest_id: &str,
        user_id: TypedId<UserId>,
        count: u32,
    ) -> Result<()> {
        let (quest_pk, quest_sk) = keys::guild_quest(guild_id, quest_id);
        let quest_item = self
            .store
            .get(&quest_pk, &quest_sk)
            .await?
            .ok_or_else(|| Error::NotFound("guild quest not found".into()))?;
        let guild_quest: GuildQuest = questforge_core::store::unmarshal(&quest_item)?;

        if guild_quest.aggregation == GuildQuestAggregation::Quantitative {
            if let Some(target) = guild_quest.target_count {
                let prefix = format!("COMPLETION#{quest_id}#");
                let result = self
                    .store
                    .query(QueryInput::new(keys::guild_pk(guild_id)).sk_begins_with(prefix).limit(500))
                    .await?;
                let others_sum: u32 = result
                    .items
                    .into_iter()
                    .map(|item| questforge_core::store::unmarshal::<GuildQuestCompletion>(&item).map(|c| c.count))
                    .collect::<std::result::Result<Vec<u32>, _>>()?
                    .into_iter()
                    .sum();
                // `others_sum` above includes this user's prior contribution, if any;
                // subtract it out so replacing it with `count` doesn't double-count.
                let (completion_pk, completion_sk) =
                    keys::guild_quest_completion(guild_id, quest_id, user_id.as_str());
                let prior = self
                    .store
                    .get(&completion_pk, &completion_sk)
                    .await?
                    .map(|item| questforge_core::store::unmarshal::<GuildQuestCompletion>(&item).map(|c| c.count))
                    .transpose()?
                    .unwrap_or(0);
                let new_total = others_sum - prior + count;
                if new_total > target {
                    return Err(Error::validation_field(
                        "count",
                        "completion would exceed the guild quest's target_count",
                    ));
                }
            }
        }

        let completion = GuildQuestCompletion {
            count,
            updated_at: now_ms(),
            ..GuildQuestCompletion::new(parse_id(guild_id)?, parse_id(quest_id)?, user_id)
        };
        let (pk, sk) = keys::guild_quest_completion(guild_id, quest_id, completion.user_id.as_str());
        self.store.put(&pk, &sk, completion.item(), None).await?;
        Ok(())
    }

    /// Aggregates a guild quest's progress across all recorded member
    /// completions (spec §4.8): `Query(PK=GUILD#<id>, SK begins_with
    /// COMPLETION#<questId>#)`.
    pub async fn guild_quest_progress(&self, guild_id: &str, quest_id: &str) -> Result<u32> {
        let (pk, sk) = keys::guild_quest(guild_id, quest_id);
        let item = self
            .store
            .get(&pk, &sk)
            .await?
            .ok_or_else(|| Error::NotFound("guild quest not found".into()))?;
        let guild_quest: GuildQuest = questforge_core::store::unmarshal(&item)?;

        let prefix = format!("COMPLETION#{quest_id}#");
        let result = self
            .store
            .query(QueryInput::new(keys::guild_pk(guild_id)).sk_begins_with(prefix).limit(500))
            .await?;
        let counts: Vec<u32> = result
            .items
            .into_iter()
            .map(|item| questforge_core::store::unmarshal::<GuildQuestCompletion>(&item).map(|c| c.count))
            .collect::<std::result::Result<_, _>>()?;

        Ok(aggregate_guild_quest(guild_quest.aggregation, guild_quest.target_count, &counts))
    }

    /// `Query(PK=GUILD#<id>, SK begins_with ACTIVITY#, limit=50, forward=false)`.
    pub async fn activity_feed(&self, guild_id: &str, limit: Option<usize>) -> Result<Vec<GuildActivity>> {
        let pk = keys::guild_pk(guild_id);
        let result = self
            .store
            .query(
                QueryInput::new(pk)
                    .sk_begins_with("ACTIVITY#")
                    .forward(false)
                    .limit(limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT)),
            )
            .await?;
        result
            .items
            .into_iter()
            .map(|item| questforge_core::store::unmarshal(&item).map_err(Error::from))
            .collect()
    }

    async fn record_activity(
        &self,
        guild_id: &str,
        actor_id: TypedId<UserId>,
        verb: &str,
        summary: &str,
    ) -> Result<()> {
        let activity = GuildActivity::new(parse_id(guild_id)?, actor_id, verb.to_string(), summary.to_string());
        let (pk, sk) = keys::guild_activity(guild_id, activity.created_at, activity.id.as_str());
        self.store.put(&pk, &sk, activity.item(), None).await?;
        Ok(())
    }

    /// Weighted member-activity rate (spec §4.8): `alpha * activeMembers /
    /// total + beta * recentActivities / windowDays + gamma *
    /// completedGoalsByMembers / total`. Computed on demand; never
    /// materialized. `active_members`/`completed_goals_by_members` are
    /// supplied by the caller since they span the goal service's data,
    /// which this service doesn't own.
    pub async fn analytics(
        &self,
        guild_id: &str,
        active_members: u32,
        completed_goals_by_members: u32,
    ) -> Result<GuildAnalytics> {
        let guild = self.get_guild(guild_id).await?;
        let total = guild.member_count.max(1);

        let recent = self
            .activity_feed(guild_id, Some(500))
            .await?
            .into_iter()
            .filter(|a| now_ms() - a.created_at <= i64::from(self.analytics.window_days) * 86_400_000)
            .count() as u32;

        let weighted_rate = self.analytics.alpha * (f64::from(active_members) / f64::from(total))
            + self.analytics.beta * (f64::from(recent) / f64::from(self.analytics.window_days.max(1)))
            + self.analytics.gamma * (f64::from(completed_goals_by_members) / f64::from(total));

        Ok(GuildAnalytics {
            active_members,
            total_members: guild.member_count,
            recent_activities: recent,
            completed_goals_by_members,
            weighted_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use questforge_core::store::memory::MemoryStore;

    fn service() -> GuildService {
        GuildService::new(Arc::new(MemoryStore::new()), GuildAnalyticsConfig::default())
    }

    #[tokio::test]
    async fn create_guild_seeds_owner_membership() {
        let svc = service();
        let owner: TypedId<UserId> = TypedId::new();
        let guild = svc.create_guild(owner.clone(), "Dawnbreakers".into(), "".into()).await.unwrap();
        assert_eq!(guild.member_count, 1);
        assert!(svc.is_member(guild.id.as_str(), owner.as_str()).await.unwrap());
    }

    #[tokio::test]
    async fn join_then_leave_updates_member_count() {
        let svc = service();
        let owner: TypedId<UserId> = TypedId::new();
        let guild = svc.create_guild(owner, "Dawnbreakers".into(), "".into()).await.unwrap();

        let joiner: TypedId<UserId> = TypedId::new();
        svc.join(guild.id.as_str(), joiner.clone()).await.unwrap();
        let after_join = svc.get_guild(guild.id.as_str()).await.unwrap();
        assert_eq!(after_join.member_count, 2);

        svc.leave(guild.id.as_str(), joiner.as_str()).await.unwrap();
        let after_leave = svc.get_guild(guild.id.as_str()).await.unwrap();
        assert_eq!(after_leave.member_count, 1);
    }

    #[tokio::test]
    async fn quantitative_guild_quest_progress_sums_completions() {
        let svc = service();
        let owner: TypedId<UserId> = TypedId::new();
        let guild = svc.create_guild(owner.clone(), "Dawnbreakers".into(), "".into()).await.unwrap();
        let quest_id: TypedId<QuestId> = TypedId::new();
        svc.add_guild_quest(guild.id.clone(), quest_id.clone(), "Read 100 books".into(), GuildQuestAggregation::Quantitative, Some(100))
            .await
            .unwrap();

        svc.record_completion(guild.id.as_str(), quest_id.as_str(), owner, 40).await.unwrap();
        let progress = svc.guild_quest_progress(guild.id.as_str(), quest_id.as_str()).await.unwrap();
        assert_eq!(progress, 40);
    }

    #[tokio::test]
    async fn quantitative_completion_rejects_past_target() {
        let svc = service();
        let owner: TypedId<UserId> = TypedId::new();
        let guild = svc.create_guild(owner.clone(), "Dawnbreakers".into(), "".into()).await.unwrap();
        let quest_id: TypedId<QuestId> = TypedId::new();
        svc.add_guild_quest(
            guild.id.clone(),
            quest_id.clone(),
            "Read 100 books".into(),
            GuildQuestAggregation::Quantitative,
            Some(100),
        )
        .await
        .unwrap();

        let other: TypedId<UserId> = TypedId::new();
        svc.record_completion(guild.id.as_str(), quest_id.as_str(), owner.clone(), 60).await.unwrap();
        svc.record_completion(guild.id.as_str(), quest_id.as_str(), other.clone(), 30).await.unwrap();

        let err = svc
            .record_completion(guild.id.as_str(), quest_id.as_str(), other.clone(), 50)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));

        // Re-recording the same user's own contribution at a smaller value
        // stays within target and succeeds.
        svc.record_completion(guild.id.as_str(), quest_id.as_str(), other, 20).await.unwrap();
        let progress = svc.guild_quest_progress(guild.id.as_str(), quest_id.as_str()).await.unwrap();
        assert_eq!(progress, 80);
    }
}
