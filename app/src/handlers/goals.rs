//! `/goals/*` — authenticated, owner-scoped goal & task CRUD (spec §4.6, §6).

use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use questforge_core::auth::Principal;
use questforge_core::error::{Error, Result};
use questforge_core::ids::{GoalId, TypedId};

use crate::entities::goal::{Goal, Task};
use crate::principal_user_id;
use crate::services::goals::GoalWithProgress;
use crate::AppState;

#[derive(Serialize)]
pub struct GoalResponse {
    #[serde(flatten)]
    pub goal: Goal,
    pub progress: u32,
    pub completed_tasks: u32,
    pub total_tasks: u32,
}

impl From<GoalWithProgress> for GoalResponse {
    fn from(g: GoalWithProgress) -> Self {
        Self {
            goal: g.goal,
            progress: g.progress,
            completed_tasks: g.completed_tasks,
            total_tasks: g.total_tasks,
        }
    }
}

#[derive(Deserialize)]
pub struct ListGoalsQuery {
    #[serde(default)]
    pub include_archived: bool,
}

pub async fn list_goals(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<ListGoalsQuery>,
) -> Result<Json<Vec<GoalResponse>>> {
    let goals = state
        .goals
        .list_goals(&principal.sub, query.include_archived)
        .await?;
    Ok(Json(goals.into_iter().map(GoalResponse::from).collect()))
}

#[derive(Deserialize)]
pub struct CreateGoalRequest {
    pub title: String,
    pub description: String,
    pub deadline_ms: i64,
}

pub async fn create_goal(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateGoalRequest>,
) -> Result<(StatusCode, Json<Goal>)> {
    let user_id = principal_user_id(&principal.sub)?;
    let goal = state
        .goals
        .create_goal(user_id, req.title, req.description, req.deadline_ms)
        .await?;
    Ok((StatusCode::CREATED, Json(goal)))
}

pub async fn get_goal(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(goal_id): Path<String>,
) -> Result<Json<GoalResponse>> {
    let goal = state.goals.get_goal(&principal.sub, &goal_id).await?;
    Ok(Json(goal.into()))
}

#[derive(Deserialize)]
pub struct UpdateGoalRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub deadline_ms: Option<i64>,
}

pub async fn update_goal(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(goal_id): Path<String>,
    Json(req): Json<UpdateGoalRequest>,
) -> Result<Json<Goal>> {
    let goal = state
        .goals
        .update_goal(&principal.sub, &goal_id, req.title, req.description, req.deadline_ms)
        .await?;
    Ok(Json(goal))
}

pub async fn archive_goal(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(goal_id): Path<String>,
) -> Result<StatusCode> {
    state.goals.archive_goal(&principal.sub, &goal_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(_principal): Extension<Principal>,
    Path(goal_id): Path<String>,
) -> Result<Json<Vec<Task>>> {
    let tasks = state.goals.list_tasks(&goal_id).await?;
    Ok(Json(tasks))
}

#[derive(Deserialize)]
pub struct AddTaskRequest {
    pub title: String,
}

pub async fn add_task(
    State(state): State<AppState>,
    Extension(_principal): Extension<Principal>,
    Path(goal_id): Path<String>,
    Json(req): Json<AddTaskRequest>,
) -> Result<(StatusCode, Json<Task>)> {
    let goal_id: TypedId<GoalId> =
        TypedId::from_str(&goal_id).map_err(|_| Error::validation_field("id", "malformed goal id"))?;
    let task = state.goals.add_task(goal_id, req.title).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

#[derive(Deserialize)]
pub struct UpdateTaskRequest {
    pub title: String,
}

pub async fn update_task(
    State(state): State<AppState>,
    Extension(_principal): Extension<Principal>,
    Path((goal_id, task_id)): Path<(String, String)>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<Task>> {
    let task = state
        .goals
        .update_task_title(&goal_id, &task_id, req.title)
        .await?;
    Ok(Json(task))
}

pub async fn toggle_task(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((goal_id, task_id)): Path<(String, String)>,
) -> Result<Json<GoalResponse>> {
    let goal = state
        .goals
        .toggle_task(&principal.sub, &goal_id, &task_id)
        .await?;
    Ok(Json(goal.into()))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(_principal): Extension<Principal>,
    Path((goal_id, task_id)): Path<(String, String)>,
) -> Result<StatusCode> {
    state.goals.delete_task(&goal_id, &task_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
