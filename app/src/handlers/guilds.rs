//! `/guilds/*` — authenticated. Listing "guilds I belong to" isn't backed
//! by a query the guild service exposes (membership rows are keyed by
//! guild, not indexed per-user for this read) — callers resolve a guild's
//! existence by id, the same way the service does internally.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use questforge_core::auth::Principal;
use questforge_core::error::Result;
use questforge_core::ids::{GuildId, QuestId, TypedId};

use crate::entities::guild::{Guild, GuildActivity, GuildMembership, GuildQuest, GuildQuestAggregation};
use crate::principal_user_id;
use crate::AppState;

#[derive(Deserialize)]
pub struct CreateGuildRequest {
    pub name: String,
    pub description: String,
}

pub async fn create_guild(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateGuildRequest>,
) -> Result<(StatusCode, Json<Guild>)> {
    let owner_id = principal_user_id(&principal.sub)?;
    let guild = state
        .guilds
        .create_guild(owner_id, req.name, req.description)
        .await?;
    Ok((StatusCode::CREATED, Json(guild)))
}

pub async fn get_guild(
    State(state): State<AppState>,
    Extension(_principal): Extension<Principal>,
    Path(guild_id): Path<String>,
) -> Result<Json<Guild>> {
    let guild = state.guilds.get_guild(&guild_id).await?;
    Ok(Json(guild))
}

pub async fn list_members(
    State(state): State<AppState>,
    Extension(_principal): Extension<Principal>,
    Path(guild_id): Path<String>,
) -> Result<Json<Vec<GuildMembership>>> {
    let members = state.guilds.list_members(&guild_id).await?;
    Ok(Json(members))
}

pub async fn join(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(guild_id): Path<String>,
) -> Result<StatusCode> {
    let user_id = principal_user_id(&principal.sub)?;
    state.guilds.join(&guild_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn leave(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(guild_id): Path<String>,
) -> Result<StatusCode> {
    state.guilds.leave(&guild_id, &principal.sub).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct AddGuildQuestRequest {
    pub quest_id: String,
    pub title: String,
    pub aggregation: GuildQuestAggregation,
    pub target_count: Option<u32>,
}

pub async fn add_guild_quest(
    State(state): State<AppState>,
    Extension(_principal): Extension<Principal>,
    Path(guild_id): Path<String>,
    Json(req): Json<AddGuildQuestRequest>,
) -> Result<(StatusCode, Json<GuildQuest>)> {
    let guild_id: TypedId<GuildId> = parse_id(&guild_id)?;
    let quest_id: TypedId<QuestId> = parse_id(&req.quest_id)?;
    let guild_quest = state
        .guilds
        .add_guild_quest(guild_id, quest_id, req.title, req.aggregation, req.target_count)
        .await?;
    Ok((StatusCode::CREATED, Json(guild_quest)))
}

#[derive(Deserialize)]
pub struct RecordCompletionRequest {
    pub count: u32,
}

pub async fn record_completion(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((guild_id, quest_id)): Path<(String, String)>,
    Json(req): Json<RecordCompletionRequest>,
) -> Result<StatusCode> {
    let user_id = principal_user_id(&principal.sub)?;
    state
        .guilds
        .record_completion(&guild_id, &quest_id, user_id, req.count)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct GuildQuestProgressResponse {
    pub progress: u32,
}

pub async fn guild_quest_progress(
    State(state): State<AppState>,
    Extension(_principal): Extension<Principal>,
    Path((guild_id, quest_id)): Path<(String, String)>,
) -> Result<Json<GuildQuestProgressResponse>> {
    let progress = state.guilds.guild_quest_progress(&guild_id, &quest_id).await?;
    Ok(Json(GuildQuestProgressResponse { progress }))
}

pub async fn activities(
    State(state): State<AppState>,
    Extension(_principal): Extension<Principal>,
    Path(guild_id): Path<String>,
) -> Result<Json<Vec<GuildActivity>>> {
    let activities = state.guilds.activity_feed(&guild_id, None).await?;
    Ok(Json(activities))
}

fn parse_id<K: questforge_core::ids::IdKind>(s: &str) -> Result<TypedId<K>> {
    use std::str::FromStr;
    TypedId::from_str(s).map_err(|_| questforge_core::error::Error::validation_field("id", "malformed identifier"))
}
