//! Goal (`USER#<id> / GOAL#<goalId>`) and task (`GOAL#<goalId> / TASK#<taskId>`) rows.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use questforge_core::ids::{GoalId, TaskId, TypedId, UserId};
use questforge_core::store::{keys, Item};

use super::now_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Active,
    Completed,
    Archived,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub id: TypedId<GoalId>,
    pub user_id: TypedId<UserId>,
    pub title: String,
    pub description: String,
    /// Epoch ms deadline, `D` in the progress formula.
    pub deadline_ms: i64,
    pub status: GoalStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Goal {
    pub fn new(user_id: TypedId<UserId>, title: String, description: String, deadline_ms: i64) -> Self {
        let now = now_ms();
        Self {
            entity_type: "Goal".to_string(),
            id: TypedId::new(),
            user_id,
            title,
            description,
            deadline_ms,
            status: GoalStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn item(&self) -> Item {
        let (pk, sk) = keys::goal(self.user_id.as_str(), self.id.as_str());
        let (gsi1_pk, gsi1_sk) = keys::goal_gsi1(self.user_id.as_str(), self.created_at);
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
pub enum TaskStatus {
    Open,
    Done,
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub id: TypedId<TaskId>,
    pub goal_id: TypedId<GoalId>,
    pub title: String,
    pub status: TaskStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    pub fn new(goal_id: TypedId<GoalId>, title: String) -> Self {
        let now = now_ms();
        Self {
            entity_type: "Task".to_string(),
            id: TypedId::new(),
            goal_id,
            title,
            status: TaskStatus::Open,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn item(&self) -> Item {
        let (pk, sk) = keys::task(self.goal_id.as_str(), self.id.as_str());
        let mut keys_map = HashMap::new();
        keys_map.insert("pk", pk);
        keys_map.insert("sk", sk);
        questforge_core::store::marshal(self, keys_map)
    }
}

/// Hybrid goal-progress computation (spec §4.6).
///
/// `total == 0` falls back to a pure time score; otherwise a 70/30 blend of
/// task completion and elapsed-time fraction, rounded to the nearest
/// percentage point.
pub fn compute_progress(
    completed: u32,
    total: u32,
    created_at_ms: i64,
    deadline_ms: i64,
    now_ms: i64,
) -> u32 {
    let time_score = if deadline_ms > created_at_ms {
        let elapsed = (now_ms - created_at_ms) as f64;
        let span = (deadline_ms - created_at_ms) as f64;
        (elapsed / span).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let progress = if total > 0 {
        let task_score = f64::from(completed) / f64::from(total.max(1));
        100.0 * (0.7 * task_score + 0.3 * time_score)
    } else {
        100.0 * time_score
    };

    progress.round() as u32
}

/// Milestones achieved at or above 25/50/75/100 (spec §4.6).
pub fn achieved_milestones(progress: u32) -> Vec<u32> {
    [25, 50, 75, 100]
        .into_iter()
        .filter(|threshold| progress >= *threshold)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_tasks_uses_pure_time_score() {
        // total=0, deadline=C+10, now=C+5 => progress = 50
        let progress = compute_progress(0, 0, 0, 10, 5);
        assert_eq!(progress, 50);
    }

    #[test]
    fn blended_score_matches_spec_example() {
        // total=4, completed=2, deadline=C+10, now=C => progress = 35
        let progress = compute_progress(2, 4, 0, 10, 0);
        assert_eq!(progress, 35);
    }

    #[test]
    fn milestones_accumulate_at_thresholds() {
        assert_eq!(achieved_milestones(60), vec![25, 50]);
        assert_eq!(achieved_milestones(100), vec![25, 50, 75, 100]);
    }
}
