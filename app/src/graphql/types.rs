//! GraphQL-facing node types (spec §4.12): thin views over the same domain
//! entities the REST response DTOs wrap, kept separate from the `entities`
//! module so `async-graphql` derives don't leak into the store layer.

use async_graphql::{Enum, SimpleObject};

use crate::entities::goal::{Goal, GoalStatus, Task, TaskStatus};
use crate::entities::messaging::ChatMessage;
use crate::entities::user::{User, UserStatus};
use crate::services::goals::GoalWithProgress;

#[derive(Clone, Copy, Eq, PartialEq, Enum)]
pub enum UserStatusNode {
    EmailConfirmationPending,
    Active,
}

impl From<UserStatus> for UserStatusNode {
    fn from(status: UserStatus) -> Self {
        match status {
            UserStatus::EmailConfirmationPending => Self::EmailConfirmationPending,
            UserStatus::Active => Self::Active,
        }
    }
}

#[derive(SimpleObject)]
pub struct UserNode {
    pub id: String,
    pub email: String,
    pub nickname: String,
    pub country: String,
    pub status: UserStatusNode,
    pub founder_pass: bool,
}

impl From<User> for UserNode {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email,
            nickname: user.nickname,
            country: user.country,
            status: user.status.into(),
            founder_pass: user.founder_pass,
        }
    }
}

#[derive(Clone, Copy, Eq, PartialEq, Enum)]
pub enum GoalStatusNode {
    Active,
    Completed,
    Archived,
}

impl From<GoalStatus> for GoalStatusNode {
    fn from(status: GoalStatus) -> Self {
        match status {
            GoalStatus::Active => Self::Active,
            GoalStatus::Completed => Self::Completed,
            GoalStatus::Archived => Self::Archived,
        }
    }
}

#[derive(SimpleObject)]
pub struct GoalNode {
    pub id: String,
    pub title: String,
    pub description: String,
    pub deadline_ms: i64,
    pub status: GoalStatusNode,
    pub progress: u32,
    pub completed_tasks: u32,
    pub total_tasks: u32,
}

impl From<Goal> for GoalNode {
    fn from(goal: Goal) -> Self {
        Self {
            id: goal.id.to_string(),
            title: goal.title,
            description: goal.description,
            deadline_ms: goal.deadline_ms,
            status: goal.status.into(),
            progress: 0,
            completed_tasks: 0,
            total_tasks: 0,
        }
    }
}

impl From<GoalWithProgress> for GoalNode {
    fn from(with_progress: GoalWithProgress) -> Self {
        Self {
            progress: with_progress.progress,
            completed_tasks: with_progress.completed_tasks,
            total_tasks: with_progress.total_tasks,
            ..with_progress.goal.into()
        }
    }
}

#[derive(Clone, Copy, Eq, PartialEq, Enum)]
pub enum TaskStatusNode {
    Open,
    Done,
    Deleted,
}

impl From<TaskStatus> for TaskStatusNode {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Open => Self::Open,
            TaskStatus::Done => Self::Done,
            TaskStatus::Deleted => Self::Deleted,
        }
    }
}

#[derive(SimpleObject)]
pub struct TaskNode {
    pub id: String,
    pub goal_id: String,
    pub title: String,
    pub status: TaskStatusNode,
}

impl From<Task> for TaskNode {
    fn from(task: Task) -> Self {
        Self {
            id: task.id.to_string(),
            goal_id: task.goal_id.to_string(),
            title: task.title,
            status: task.status.into(),
        }
    }
}

#[derive(SimpleObject, Clone)]
pub struct ChatMessageNode {
    pub id: String,
    pub room_id: String,
    pub sender_id: String,
    pub body: String,
    pub created_at: i64,
}

impl From<ChatMessage> for ChatMessageNode {
    fn from(message: ChatMessage) -> Self {
        Self {
            id: message.id.to_string(),
            room_id: message.scope_id,
            sender_id: message.sender_id.to_string(),
            body: message.body,
            created_at: message.created_at,
        }
    }
}
