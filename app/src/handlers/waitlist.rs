//! `POST /waitlist/subscribe` — public, rate-limited 5/min/IP (spec §6, §8).

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use questforge_core::error::Result;

use crate::AppState;

#[derive(Deserialize)]
pub struct SubscribeRequest {
    pub email: String,
}

#[derive(Serialize)]
pub struct SubscribeResponse {
    pub email: String,
}

pub async fn subscribe(
    State(state): State<AppState>,
    Json(req): Json<SubscribeRequest>,
) -> Result<(StatusCode, Json<SubscribeResponse>)> {
    let entry = state.waitlist.subscribe(req.email).await?;
    Ok((StatusCode::CREATED, Json(SubscribeResponse { email: entry.email })))
}
