//! Quest (`USER#<id> / QUEST#<questId>`) and audit trail
//! (`QUEST#<questId> / AUDIT#<ts>#<seq>`) rows.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use questforge_core::audit::chain::ChainedEntry;
use questforge_core::ids::{GoalId, QuestId, TaskId, TypedId, UserId};
use questforge_core::store::{keys, Item};

use super::now_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestStatus {
    Draft,
    Active,
    Completed,
    Failed,
    Cancelled,
}

impl QuestStatus {
    /// The state machine in spec §4.7: only these transitions are allowed.
    pub fn can_transition_to(self, next: QuestStatus) -> bool {
        use QuestStatus::*;
        matches!(
            (self, next),
            (Draft, Active) | (Draft, Cancelled) |
            (Active, Completed) | (Active, Failed) | (Active, Cancelled)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum QuestKind {
    /// Progress derives from referenced goals/tasks.
    Linked {
        goal_ids: Vec<TypedId<GoalId>>,
        task_ids: Vec<TypedId<TaskId>>,
    },
    /// Progress derives from a numeric counter against a target.
    Quantitative { target_count: u32, current_count: u32 },
}

impl QuestKind {
    /// `min(100, round(100 * current / target))` for quantitative quests;
    /// linked quests report progress the caller must derive from the
    /// referenced goals (no self-contained numeric state here).
    pub fn progress(&self) -> Option<u32> {
        match self {
            QuestKind::Quantitative { target_count, current_count } if *target_count > 0 => {
                Some(100.min(((*current_count as f64 / *target_count as f64) * 100.0).round() as u32))
            }
            QuestKind::Quantitative { .. } => Some(0),
            QuestKind::Linked { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quest {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub id: TypedId<QuestId>,
    pub user_id: TypedId<UserId>,
    pub title: String,
    pub status: QuestStatus,
    pub kind: QuestKind,
    /// Optimistic-lock version counter; every mutation writes `prev + 1`.
    pub version: i64,
    /// Present when the quest is scoped to a guild (spec §4.7: "read is
    /// owner-only unless quest is linked to a guild").
    pub guild_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Quest {
    pub fn new(user_id: TypedId<UserId>, title: String, kind: QuestKind) -> Self {
        let now = now_ms();
        Self {
            entity_type: "Quest".to_string(),
            id: TypedId::new(),
            user_id,
            title,
            status: QuestStatus::Draft,
            kind,
            version: 1,
            guild_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn item(&self) -> Item {
        let (pk, sk) = keys::quest(self.user_id.as_str(), self.id.as_str());
        let (gsi1_pk, gsi1_sk) = keys::quest_gsi1(self.user_id.as_str(), self.created_at);
        let mut keys_map = HashMap::new();
        keys_map.insert("pk", pk);
        keys_map.insert("sk", sk);
        keys_map.insert("gsi1pk", gsi1_pk);
        keys_map.insert("gsi1sk", gsi1_sk);
        questforge_core::store::marshal(self, keys_map)
    }
}

/// One sealed audit row under `QUEST#<id> / AUDIT#<ts>#<seq>` (spec §3:
/// "every state transition ... appends an audit row").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestAuditEntry {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub quest_id: TypedId<QuestId>,
    pub actor: TypedId<UserId>,
    pub from: String,
    pub to: String,
    pub ts: i64,
    pub reason: Option<String>,
    pub sequence: u64,
    pub previous_hash: Option<String>,
    pub hash: Option<String>,
}

impl QuestAuditEntry {
    pub fn new(
        quest_id: TypedId<QuestId>,
        actor: TypedId<UserId>,
        from: impl Into<String>,
        to: impl Into<String>,
        reason: Option<String>,
    ) -> Self {
        Self {
            entity_type: "QuestAudit".to_string(),
            quest_id,
            actor,
            from: from.into(),
            to: to.into(),
            ts: now_ms(),
            reason,
            sequence: 0,
            previous_hash: None,
            hash: None,
        }
    }

    pub fn item(&self) -> Item {
        let (pk, sk) = keys::quest_audit_entry(self.quest_id.as_str(), self.ts, self.sequence);
        let mut keys_map = HashMap::new();
        keys_map.insert("pk", pk);
        keys_map.insert("sk", sk);
        questforge_core::store::marshal(self, keys_map)
    }
}

impl ChainedEntry for QuestAuditEntry {
    fn content_bytes(&self) -> Vec<u8> {
        format!(
            "{}|{}|{}|{}|{}",
            self.quest_id.as_str(),
            self.from,
            self.to,
            self.actor.as_str(),
            self.ts
        )
        .into_bytes()
    }
    fn sequence(&self) -> u64 {
        self.sequence
    }
    fn set_sequence(&mut self, sequence: u64) {
        self.sequence = sequence;
    }
    fn previous_hash(&self) -> Option<&str> {
        self.previous_hash.as_deref()
    }
    fn set_previous_hash(&mut self, previous_hash: Option<String>) {
        self.previous_hash = previous_hash;
    }
    fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }
    fn set_hash(&mut self, hash: String) {
        self.hash = Some(hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_may_activate_or_cancel_only() {
        assert!(QuestStatus::Draft.can_transition_to(QuestStatus::Active));
        assert!(QuestStatus::Draft.can_transition_to(QuestStatus::Cancelled));
        assert!(!QuestStatus::Draft.can_transition_to(QuestStatus::Completed));
    }

    #[test]
    fn terminal_states_have_no_outgoing_transition() {
        for terminal in [QuestStatus::Completed, QuestStatus::Failed, QuestStatus::Cancelled] {
            for next in [QuestStatus::Draft, QuestStatus::Active, QuestStatus::Completed] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn quantitative_progress_caps_at_100() {
        let kind = QuestKind::Quantitative { target_count: 3, current_count: 5 };
        assert_eq!(kind.progress(), Some(100));
    }
}
