//! Guild (`GUILD#<id> / GUILD#<id>`), membership (`GUILD#<id> / MEMBER#<userId>`),
//! guild quest, per-member completion, and activity feed rows (spec §4.8).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use questforge_core::ids::{ActivityId, GuildId, QuestId, TypedId, UserId};
use questforge_core::store::{keys, Item};

use super::now_ms;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guild {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub id: TypedId<GuildId>,
    pub name: String,
    pub description: String,
    pub owner_id: TypedId<UserId>,
    pub member_count: u32,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Guild {
    pub fn new(name: String, description: String, owner_id: TypedId<UserId>) -> Self {
        let now = now_ms();
        Self {
            entity_type: "Guild".to_string(),
            id: TypedId::new(),
            name,
            description,
            owner_id,
            member_count: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn item(&self) -> Item {
        let (pk, sk) = keys::guild(self.id.as_str());
        let (gsi1_pk, gsi1_sk) = keys::guild_gsi1(self.id.as_str());
        let mut keys_map = HashMap::new();
        keys_map.insert("pk", pk);
        keys_map.insert("sk", sk);
        keys_map.insert("gsi1pk", gsi1_pk);
        keys_map.insert("gsi1sk", gsi1_sk);
        questforge_core::store::marshal(self, keys_map)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuildRole {
    Owner,
    Member,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildMembership {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub guild_id: TypedId<GuildId>,
    pub user_id: TypedId<UserId>,
    pub role: GuildRole,
    pub joined_at: i64,
}

impl GuildMembership {
    pub fn new(guild_id: TypedId<GuildId>, user_id: TypedId<UserId>, role: GuildRole) -> Self {
        Self {
            entity_type: "GuildMembership".to_string(),
            guild_id,
            user_id,
            role,
            joined_at: now_ms(),
        }
    }

    pub fn item(&self) -> Item {
        let (pk, sk) = keys::guild_membership(self.guild_id.as_str(), self.user_id.as_str());
        let (gsi1_pk, gsi1_sk) = keys::guild_membership_gsi1(self.user_id.as_str(), self.joined_at);
        let mut keys_map = HashMap::new();
        keys_map.insert("pk", pk);
        keys_map.insert("sk", sk);
        keys_map.insert("gsi1pk", gsi1_pk);
        keys_map.insert("gsi1sk", gsi1_sk);
        questforge_core::store::marshal(self, keys_map)
    }
}

/// How a guild quest's per-member completions aggregate into the group's
/// overall progress (spec §4.8: "quantitative sums, percentual averages").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuildQuestAggregation {
    Quantitative,
    Percentual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildQuest {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub guild_id: TypedId<GuildId>,
    pub quest_id: TypedId<QuestId>,
    pub title: String,
    pub aggregation: GuildQuestAggregation,
    pub target_count: Option<u32>,
    pub created_at: i64,
}

impl GuildQuest {
    pub fn new(
        guild_id: TypedId<GuildId>,
        quest_id: TypedId<QuestId>,
        title: String,
        aggregation: GuildQuestAggregation,
        target_count: Option<u32>,
    ) -> Self {
        Self {
            entity_type: "GuildQuest".to_string(),
            guild_id,
            quest_id,
            title,
            aggregation,
            target_count,
            created_at: now_ms(),
        }
    }

    pub fn item(&self) -> Item {
        let (pk, sk) = keys::guild_quest(self.guild_id.as_str(), self.quest_id.as_str());
        let mut keys_map = HashMap::new();
        keys_map.insert("pk", pk);
        keys_map.insert("sk", sk);
        questforge_core::store::marshal(self, keys_map)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildQuestCompletion {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub guild_id: TypedId<GuildId>,
    pub quest_id: TypedId<QuestId>,
    pub user_id: TypedId<UserId>,
    pub count: u32,
    pub updated_at: i64,
}

impl GuildQuestCompletion {
    pub fn new(guild_id: TypedId<GuildId>, quest_id: TypedId<QuestId>, user_id: TypedId<UserId>) -> Self {
        Self {
            entity_type: "GuildQuestCompletion".to_string(),
            guild_id,
            quest_id,
            user_id,
            count: 0,
            updated_at: now_ms(),
        }
    }

    pub fn item(&self) -> Item {
        let (pk, sk) =
            keys::guild_quest_completion(self.guild_id.as_str(), self.quest_id.as_str(), self.user_id.as_str());
        let mut keys_map = HashMap::new();
        keys_map.insert("pk", pk);
        keys_map.insert("sk", sk);
        questforge_core::store::marshal(self, keys_map)
    }
}

/// Aggregate a guild quest's member completions per spec §4.8.
pub fn aggregate_guild_quest(
    aggregation: GuildQuestAggregation,
    target_count: Option<u32>,
    member_counts: &[u32],
) -> u32 {
    match aggregation {
        GuildQuestAggregation::Quantitative => {
            let sum: u32 = member_counts.iter().sum();
            match target_count {
                Some(target) if target > 0 => 100.min(((sum as f64 / target as f64) * 100.0).round() as u32),
                _ => 0,
            }
        }
        GuildQuestAggregation::Percentual => {
            if member_counts.is_empty() {
                0
            } else {
                let total: u32 = member_counts.iter().sum();
                (total as f64 / member_counts.len() as f64).round() as u32
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildActivity {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub id: TypedId<ActivityId>,
    pub guild_id: TypedId<GuildId>,
    pub actor_id: TypedId<UserId>,
    pub verb: String,
    pub summary: String,
    pub created_at: i64,
}

impl GuildActivity {
    pub fn new(guild_id: TypedId<GuildId>, actor_id: TypedId<UserId>, verb: String, summary: String) -> Self {
        Self {
            entity_type: "GuildActivity".to_string(),
            id: TypedId::new(),
            guild_id,
            actor_id,
            verb,
            summary,
            created_at: now_ms(),
        }
    }

    pub fn item(&self) -> Item {
        let (pk, sk) = keys::guild_activity(self.guild_id.as_str(), self.created_at, self.id.as_str());
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
    fn quantitative_sums_member_counts() {
        let pct = aggregate_guild_quest(GuildQuestAggregation::Quantitative, Some(10), &[3, 4]);
        assert_eq!(pct, 70);
    }

    #[test]
    fn percentual_averages_member_counts() {
        let pct = aggregate_guild_quest(GuildQuestAggregation::Percentual, None, &[40, 60]);
        assert_eq!(pct, 50);
    }

    #[test]
    fn percentual_with_no_members_is_zero() {
        let pct = aggregate_guild_quest(GuildQuestAggregation::Percentual, None, &[]);
        assert_eq!(pct, 0);
    }
}
