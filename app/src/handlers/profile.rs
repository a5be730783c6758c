//! `GET/PUT /profile` — authenticated, owner-scoped. The response DTO
//! strips `password_hash`; the `User` entity is never serialized directly
//! to a client.

use axum::extract::State;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use questforge_core::auth::Principal;
use questforge_core::error::Result;

use crate::entities::user::User;
use crate::services::users::UpdateProfileInput;
use crate::{principal_user_id, AppState};

#[derive(Serialize)]
pub struct ProfileResponse {
    pub id: String,
    pub email: String,
    pub nickname: String,
    pub country: String,
    pub birth_date: String,
    pub status: String,
    pub founder_pass: bool,
}

impl From<User> for ProfileResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.as_str().to_string(),
            email: user.email,
            nickname: user.nickname,
            country: user.country,
            birth_date: user.birth_date,
            status: format!("{:?}", user.status),
            founder_pass: user.founder_pass,
        }
    }
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<ProfileResponse>> {
    let user = state.users.get_profile(&principal.sub).await?;
    Ok(Json(user.into()))
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub nickname: Option<String>,
    pub country: Option<String>,
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>> {
    let user_id = principal_user_id(&principal.sub)?;
    let user = state
        .users
        .update_profile(
            user_id.as_str(),
            UpdateProfileInput {
                nickname: req.nickname,
                country: req.country,
            },
        )
        .await?;
    Ok(Json(user.into()))
}
