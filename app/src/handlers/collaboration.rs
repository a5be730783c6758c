//! `/collaborations/*` — authenticated. Invites/collaborators/comments/
//! reactions, all scoped under a `(resource_type, resource_id)` pair
//! (spec §4.9).

use std::str::FromStr;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use questforge_core::auth::Principal;
use questforge_core::error::{Error, Result};
use questforge_core::ids::{CommentId, TypedId};

use crate::entities::collaboration::{Collaborator, Comment, Invite, Reaction};
use crate::principal_user_id;
use crate::services::collaboration::extract_mentions;
use crate::AppState;

#[derive(Deserialize)]
pub struct SendInviteRequest {
    pub resource_type: String,
    pub resource_id: String,
    pub invitee_id: String,
}

pub async fn send_invite(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<SendInviteRequest>,
) -> Result<(StatusCode, Json<Invite>)> {
    let inviter_id = principal_user_id(&principal.sub)?;
    let invitee_id = principal_user_id(&req.invitee_id)?;
    let invite = state
        .collaboration
        .send_invite(req.resource_type, req.resource_id, inviter_id, invitee_id)
        .await?;
    Ok((StatusCode::CREATED, Json(invite)))
}

#[derive(Deserialize)]
pub struct InviteActionRequest {
    pub resource_type: String,
    pub resource_id: String,
}

pub async fn accept_invite(
    State(state): State<AppState>,
    Extension(_principal): Extension<Principal>,
    Path(invite_id): Path<String>,
    Json(req): Json<InviteActionRequest>,
) -> Result<Json<Collaborator>> {
    let collaborator = state
        .collaboration
        .accept_invite(&req.resource_type, &req.resource_id, &invite_id)
        .await?;
    Ok(Json(collaborator))
}

pub async fn decline_invite(
    State(state): State<AppState>,
    Extension(_principal): Extension<Principal>,
    Path(invite_id): Path<String>,
    Json(req): Json<InviteActionRequest>,
) -> Result<StatusCode> {
    state
        .collaboration
        .decline_invite(&req.resource_type, &req.resource_id, &invite_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct AddCommentRequest {
    pub resource_type: String,
    pub resource_id: String,
    pub body: String,
}

pub async fn add_comment(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<AddCommentRequest>,
) -> Result<(StatusCode, Json<Comment>)> {
    let author_id = principal_user_id(&principal.sub)?;
    let mut mentions = Vec::new();
    for nickname in extract_mentions(&req.body) {
        if let Some(user) = state.users.find_by_nickname(&nickname).await? {
            mentions.push(user.id);
        }
    }
    let comment = state
        .collaboration
        .add_comment(req.resource_type, req.resource_id, author_id, req.body, mentions)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn list_comments(
    State(state): State<AppState>,
    Extension(_principal): Extension<Principal>,
    Path((resource_type, resource_id)): Path<(String, String)>,
) -> Result<Json<Vec<Comment>>> {
    let comments = state.collaboration.list_comments(&resource_type, &resource_id).await?;
    Ok(Json(comments))
}

#[derive(Deserialize)]
pub struct ToggleReactionRequest {
    pub emoji: String,
}

pub async fn toggle_reaction(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(comment_id): Path<String>,
    Json(req): Json<ToggleReactionRequest>,
) -> Result<Json<Option<Reaction>>> {
    let comment_id: TypedId<CommentId> =
        TypedId::from_str(&comment_id).map_err(|_| Error::validation_field("id", "malformed comment id"))?;
    let user_id = principal_user_id(&principal.sub)?;
    let reaction = state
        .collaboration
        .toggle_reaction(comment_id, user_id, req.emoji)
        .await?;
    Ok(Json(reaction))
}
