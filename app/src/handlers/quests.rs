//! `/quests/*` — authenticated; transition routes map to the state machine
//! in spec §4.7.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use questforge_core::auth::Principal;
use questforge_core::error::Result;

use crate::entities::quest::{Quest, QuestKind, QuestStatus};
use crate::principal_user_id;
use crate::AppState;

pub async fn list_quests(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<Quest>>> {
    let quests = state.quests.list_quests(&principal.sub).await?;
    Ok(Json(quests))
}

#[derive(Deserialize)]
pub struct CreateQuestRequest {
    pub title: String,
    pub kind: QuestKind,
}

pub async fn create_quest(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateQuestRequest>,
) -> Result<(StatusCode, Json<Quest>)> {
    let user_id = principal_user_id(&principal.sub)?;
    let quest = state.quests.create_quest(user_id, req.title, req.kind).await?;
    Ok((StatusCode::CREATED, Json(quest)))
}

pub async fn get_quest(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(quest_id): Path<String>,
) -> Result<Json<Quest>> {
    let quest = state
        .quests
        .get_quest(&principal.sub, &quest_id, &principal.sub)
        .await?;
    Ok(Json(quest))
}

#[derive(Deserialize, Default)]
pub struct TransitionRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

async fn do_transition(
    state: AppState,
    principal: Principal,
    quest_id: String,
    next: QuestStatus,
    reason: Option<String>,
) -> Result<Json<Quest>> {
    let actor = principal_user_id(&principal.sub)?;
    let quest = state
        .quests
        .transition(&principal.sub, &quest_id, actor, next, reason)
        .await?;
    Ok(Json(quest))
}

pub async fn start(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(quest_id): Path<String>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<Quest>> {
    do_transition(state, principal, quest_id, QuestStatus::Active, req.reason).await
}

pub async fn complete(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(quest_id): Path<String>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<Quest>> {
    do_transition(state, principal, quest_id, QuestStatus::Completed, req.reason).await
}

pub async fn cancel(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(quest_id): Path<String>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<Quest>> {
    do_transition(state, principal, quest_id, QuestStatus::Cancelled, req.reason).await
}

pub async fn fail(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(quest_id): Path<String>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<Quest>> {
    do_transition(state, principal, quest_id, QuestStatus::Failed, req.reason).await
}

#[derive(Deserialize)]
pub struct IncrementRequest {
    pub delta: u32,
}

pub async fn increment(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(quest_id): Path<String>,
    Json(req): Json<IncrementRequest>,
) -> Result<Json<Quest>> {
    let actor = principal_user_id(&principal.sub)?;
    let quest = state
        .quests
        .increment_quest(&principal.sub, &quest_id, actor, req.delta)
        .await?;
    Ok(Json(quest))
}
