//! Goal & Task Service (C6): CRUD plus the hybrid progress computation.

use std::sync::Arc;

use tracing::info;

use questforge_core::error::{Error, Result};
use questforge_core::ids::{GoalId, TypedId, UserId};
use questforge_core::store::{keys, Condition, QueryInput, SetOp, StoreClient};

use crate::entities::goal::{achieved_milestones, compute_progress, Goal, GoalStatus, Task, TaskStatus};
use crate::entities::now_ms;

pub struct GoalService {
    store: Arc<dyn StoreClient>,
}

/// A goal plus its computed progress, returned by reads that need both
/// (the profile/list endpoints never persist progress — it's derived).
pub struct GoalWithProgress {
    pub goal: Goal,
    pub progress: u32,
    pub completed_tasks: u32,
    pub total_tasks: u32,
}

impl GoalService {
    pub fn new(store: Arc<dyn StoreClient>) -> Self {
        Self { store }
    }

    pub async fn create_goal(
        &self,
        user_id: TypedId<UserId>,
        title: String,
        description: String,
        deadline_ms: i64,
    ) -> Result<Goal> {
        if title.trim().is_empty() {
            return Err(Error::validation_field("title", "title must not be empty"));
        }
        let goal = Goal::new(user_id, title, description, deadline_ms);
        let (pk, sk) = keys::goal(goal.user_id.as_str(), goal.id.as_str());
        self.store.put(&pk, &sk, goal.item(), None).await?;
        Ok(goal)
    }

    /// `Query(PK=USER#<id>, SK begins_with GOAL#)` per spec §4.6.
    pub async fn list_goals(&self, user_id: &str, include_archived: bool) -> Result<Vec<GoalWithProgress>> {
        let pk = keys::user_pk(user_id);
        let result = self
            .store
            .query(QueryInput::new(pk).sk_begins_with("GOAL#").limit(200))
            .await?;

        let mut goals = Vec::with_capacity(result.items.len());
        for item in result.items {
            let goal: Goal = questforge_core::store::unmarshal(&item)?;
            if !include_archived && goal.status == GoalStatus::Archived {
                continue;
            }
            let with_progress = self.with_progress(goal).await?;
            goals.push(with_progress);
        }
        Ok(goals)
    }

    pub async fn get_goal(&self, user_id: &str, goal_id: &str) -> Result<GoalWithProgress> {
        let goal = self.fetch_goal(user_id, goal_id).await?;
        self.with_progress(goal).await
    }

    pub async fn update_goal(
        &self,
        user_id: &str,
        goal_id: &str,
        title: Option<String>,
        description: Option<String>,
        deadline_ms: Option<i64>,
    ) -> Result<Goal> {
        self.fetch_goal(user_id, goal_id).await?;

        let mut sets = vec![SetOp::Set("updated_at".to_string(), serde_json::json!(now_ms()))];
        if let Some(title) = title {
            if title.trim().is_empty() {
                return Err(Error::validation_field("title", "title must not be empty"));
            }
            sets.push(SetOp::Set("title".to_string(), serde_json::json!(title)));
        }
        if let Some(description) = description {
            sets.push(SetOp::Set(
                "description".to_string(),
                serde_json::json!(description),
            ));
        }
        if let Some(deadline_ms) = deadline_ms {
            sets.push(SetOp::Set(
                "deadline_ms".to_string(),
                serde_json::json!(deadline_ms),
            ));
        }

        let (pk, sk) = keys::goal(user_id, goal_id);
        let item = self
            .store
            .update(&pk, &sk, sets, Some(Condition::AttributeExists("pk".to_string())))
            .await?;
        questforge_core::store::unmarshal(&item)
    }

    /// Archive rather than physically delete, so historic progress stays
    /// queryable (spec §9: archived goals excluded from `myGoals` by default).
    pub async fn archive_goal(&self, user_id: &str, goal_id: &str) -> Result<()> {
        self.fetch_goal(user_id, goal_id).await?;
        let (pk, sk) = keys::goal(user_id, goal_id);
        self.store
            .update(
                &pk,
                &sk,
                vec![
                    SetOp::Set("status".to_string(), serde_json::json!("archived")),
                    SetOp::Set("updated_at".to_string(), serde_json::json!(now_ms())),
                ],
                Some(Condition::AttributeExists("pk".to_string())),
            )
            .await?;
        Ok(())
    }

    pub async fn add_task(&self, goal_id: TypedId<GoalId>, title: String) -> Result<Task> {
        if title.trim().is_empty() {
            return Err(Error::validation_field("title", "title must not be empty"));
        }
        let task = Task::new(goal_id, title);
        let (pk, sk) = keys::task(task.goal_id.as_str(), task.id.as_str());
        self.store.put(&pk, &sk, task.item(), None).await?;
        Ok(task)
    }

    /// `Query(PK=GOAL#<id>, SK begins_with TASK#)` per spec §4.6.
    pub async fn list_tasks(&self, goal_id: &str) -> Result<Vec<Task>> {
        let pk = keys::goal_pk(goal_id);
        let result = self
            .store
            .query(QueryInput::new(pk).sk_begins_with("TASK#").limit(500))
            .await?;
        result
            .items
            .into_iter()
            .map(|item| questforge_core::store::unmarshal(&item).map_err(Error::from))
            .collect()
    }

    pub async fn update_task_title(&self, goal_id: &str, task_id: &str, title: String) -> Result<Task> {
        if title.trim().is_empty() {
            return Err(Error::validation_field("title", "title must not be empty"));
        }
        let (pk, sk) = keys::task(goal_id, task_id);
        let item = self
            .store
            .update(
                &pk,
                &sk,
                vec![
                    SetOp::Set("title".to_string(), serde_json::json!(title)),
                    SetOp::Set("updated_at".to_string(), serde_json::json!(now_ms())),
                ],
                Some(Condition::AttributeExists("pk".to_string())),
            )
            .await?;
        questforge_core::store::unmarshal(&item)
    }

    /// Flips a task between `open`/`done`; recomputes the parent goal's
    /// progress and logs any newly-crossed milestone (spec §4.6).
    pub async fn toggle_task(&self, user_id: &str, goal_id: &str, task_id: &str) -> Result<GoalWithProgress> {
        let goal = self.fetch_goal(user_id, goal_id).await?;
        let before = self.with_progress_inner(&goal).await?;

        let (pk, sk) = keys::task(goal_id, task_id);
        let existing = self
            .store
            .get(&pk, &sk)
            .await?
            .ok_or_else(|| Error::NotFound("task not found".into()))?;
        let task: Task = questforge_core::store::unmarshal(&existing)?;
        let new_status = match task.status {
            TaskStatus::Open => TaskStatus::Done,
            TaskStatus::Done => TaskStatus::Open,
            TaskStatus::Deleted => return Err(Error::validation("task was deleted")),
        };

        self.store
            .update(
                &pk,
                &sk,
                vec![
                    SetOp::Set("status".to_string(), serde_json::json!(status_str(new_status))),
                    SetOp::Set("updated_at".to_string(), serde_json::json!(now_ms())),
                ],
                Some(Condition::AttributeExists("pk".to_string())),
            )
            .await?;

        let after = self.with_progress(goal).await?;
        for milestone in achieved_milestones(after.progress) {
            if !achieved_milestones(before.0).contains(&milestone) {
                info!(
                    user_id,
                    goal_id, milestone, "goal progress milestone achieved"
                );
            }
        }
        Ok(after)
    }

    pub async fn delete_task(&self, goal_id: &str, task_id: &str) -> Result<()> {
        let (pk, sk) = keys::task(goal_id, task_id);
        self.store.delete(&pk, &sk, None).await?;
        Ok(())
    }

    async fn fetch_goal(&self, user_id: &str, goal_id: &str) -> Result<Goal> {
        let (pk, sk) = keys::goal(user_id, goal_id);
        let item = self
            .store
            .get(&pk, &sk)
            .await?
            .ok_or_else(|| Error::NotFound("goal not found".into()))?;
        questforge_core::store::unmarshal(&item)
    }

    async fn with_progress(&self, goal: Goal) -> Result<GoalWithProgress> {
        let (progress, completed, total) = self.with_progress_inner(&goal).await?;
        Ok(GoalWithProgress {
            goal,
            progress,
            completed_tasks: completed,
            total_tasks: total,
        })
    }

    async fn with_progress_inner(&self, goal: &Goal) -> Result<(u32, u32, u32)> {
        let tasks = self.list_tasks(goal.id.as_str()).await?;
        let live: Vec<&Task> = tasks.iter().filter(|t| t.status != TaskStatus::Deleted).collect();
        let total = live.len() as u32;
        let completed = live.iter().filter(|t| t.status == TaskStatus::Done).count() as u32;
        let progress = compute_progress(completed, total, goal.created_at, goal.deadline_ms, now_ms());
        Ok((progress, completed, total))
    }
}

fn status_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Open => "open",
        TaskStatus::Done => "done",
        TaskStatus::Deleted => "deleted",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use questforge_core::store::memory::MemoryStore;

    fn service() -> GoalService {
        GoalService::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn progress_reflects_task_completion() {
        let svc = service();
        let user_id: TypedId<UserId> = TypedId::new();
        let goal = svc
            .create_goal(user_id.clone(), "Learn Rust".into(), "".into(), now_ms() + 10_000)
            .await
            .unwrap();
        let task = svc.add_task(goal.id.clone(), "Read book".into()).await.unwrap();

        let before = svc.get_goal(user_id.as_str(), goal.id.as_str()).await.unwrap();
        assert_eq!(before.completed_tasks, 0);

        let after = svc
            .toggle_task(user_id.as_str(), goal.id.as_str(), task.id.as_str())
            .await
            .unwrap();
        assert_eq!(after.completed_tasks, 1);
        assert_eq!(after.total_tasks, 1);
    }

    #[tokio::test]
    async fn archived_goals_excluded_by_default() {
        let svc = service();
        let user_id: TypedId<UserId> = TypedId::new();
        let goal = svc
            .create_goal(user_id.clone(), "Archive me".into(), "".into(), now_ms() + 10_000)
            .await
            .unwrap();
        svc.archive_goal(user_id.as_str(), goal.id.as_str()).await.unwrap();

        let default_list = svc.list_goals(user_id.as_str(), false).await.unwrap();
        assert!(default_list.is_empty());

        let with_archived = svc.list_goals(user_id.as_str(), true).await.unwrap();
        assert_eq!(with_archived.len(), 1);
    }
}
