//! `/auth/*` — public, unauthenticated endpoints. `/auth/login` sits behind
//! its own rate-limit scope (spec §8: 10/min/IP).

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use questforge_core::error::Result;

use crate::services::users::SignupInput;
use crate::AppState;

#[derive(Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub nickname: String,
    pub password: String,
    pub country: String,
    pub birth_date: String,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub nickname: String,
    pub country: String,
    pub status: String,
}

fn to_user_response(user: crate::entities::user::User) -> UserResponse {
    UserResponse {
        id: user.id.as_str().to_string(),
        email: user.email,
        nickname: user.nickname,
        country: user.country,
        status: format!("{:?}", user.status),
    }
}

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let user = state
        .users
        .signup(SignupInput {
            email: req.email,
            nickname: req.nickname,
            password: req.password,
            country: req.country,
            birth_date: req.birth_date,
        })
        .await?;

    let token = state.users.issue_email_confirmation_token(user.id.as_str());
    state
        .mailer
        .send(
            &user.email,
            "Confirm your email",
            &format!("Use this token to confirm your account: {token}"),
        )
        .await
        .ok();

    Ok((StatusCode::CREATED, Json(to_user_response(user))))
}

#[derive(Deserialize)]
pub struct ConfirmEmailRequest {
    pub token: String,
}

pub async fn confirm(
    State(state): State<AppState>,
    Json(req): Json<ConfirmEmailRequest>,
) -> Result<StatusCode> {
    state.users.confirm_email(&req.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: UserResponse,
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let client_ip = extract_client_ip(&headers);
    let outcome = state
        .users
        .login(&req.email, &req.password, client_ip.as_deref())
        .await?;
    state
        .subscriptions
        .apply_founder_pass_if_eligible(outcome.user.id.clone(), &outcome.user.email)
        .await
        .ok();
    Ok(Json(LoginResponse {
        access_token: outcome.access_token,
        user: to_user_response(outcome.user),
    }))
}

#[derive(Deserialize)]
pub struct RequestPasswordResetRequest {
    pub email: String,
}

#[derive(Serialize)]
pub struct RequestPasswordResetResponse {
    /// Only present so integration tests can drive the flow without a real
    /// mailer; a production deployment never echoes this to the client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_token: Option<String>,
}

/// Always `200`, regardless of whether the email exists (spec §4.5:
/// "reveals nothing" about account existence).
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(req): Json<RequestPasswordResetRequest>,
) -> Result<Json<RequestPasswordResetResponse>> {
    let token = state.users.request_password_reset(&req.email).await?;
    if let Some(token) = &token {
        state
            .mailer
            .send(
                &req.email,
                "Reset your password",
                &format!("Use this token to reset your password: {token}"),
            )
            .await
            .ok();
    }
    Ok(Json(RequestPasswordResetResponse { debug_token: None }))
}

#[derive(Deserialize)]
pub struct ConfirmPasswordResetRequest {
    pub token: String,
    pub new_password: String,
}

pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(req): Json<ConfirmPasswordResetRequest>,
) -> Result<StatusCode> {
    state
        .users
        .reset_password(&req.token, &req.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        return xff.split(',').next().map(|s| s.trim().to_string());
    }
    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}
