//! `/subscriptions/*`, `/credits/*`, and the Stripe webhook (spec §4.11).

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use questforge_core::auth::Principal;
use questforge_core::error::Result;

use crate::entities::subscription::{Subscription, Tier, WebhookEvent};
use crate::payment::CheckoutSession;
use crate::principal_user_id;
use crate::AppState;

pub async fn current(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Subscription>> {
    let user_id = principal_user_id(&principal.sub)?;
    let subscription = state.subscriptions.get_or_create(user_id).await?;
    Ok(Json(subscription))
}

#[derive(Deserialize)]
pub struct CreateCheckoutRequest {
    pub tier: Tier,
}

pub async fn create_checkout(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateCheckoutRequest>,
) -> Result<Json<CheckoutSession>> {
    let session = state
        .subscriptions
        .create_checkout_session(&principal.sub, req.tier)
        .await?;
    Ok(Json(session))
}

/// `PaymentGateway` exposes only checkout-session creation — cancellation
/// and the billing portal are provider-hosted flows this deployment
/// doesn't integrate (spec Non-goals: no live payment provider). Both
/// routes exist so clients get a defined response rather than a 404.
pub async fn cancel() -> StatusCode {
    StatusCode::NOT_IMPLEMENTED
}

pub async fn portal() -> StatusCode {
    StatusCode::NOT_IMPLEMENTED
}

#[derive(Serialize)]
pub struct CreditBalanceResponse {
    pub credit_balance: u32,
}

pub async fn credit_balance(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<CreditBalanceResponse>> {
    let user_id = principal_user_id(&principal.sub)?;
    let subscription = state.subscriptions.get_or_create(user_id).await?;
    Ok(Json(CreditBalanceResponse {
        credit_balance: subscription.credit_balance,
    }))
}

#[derive(Deserialize)]
pub struct CreditTopupRequest {
    pub amount: u32,
}

pub async fn credit_topup(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreditTopupRequest>,
) -> Result<StatusCode> {
    state
        .subscriptions
        .credit(&principal.sub, req.amount, "manual top-up".to_string())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct StripeWebhookRequest {
    pub user_id: String,
    pub event_id: String,
    #[serde(flatten)]
    pub event: WebhookEvent,
}

pub async fn stripe_webhook(
    State(state): State<AppState>,
    Json(req): Json<StripeWebhookRequest>,
) -> Result<StatusCode> {
    state
        .subscriptions
        .handle_webhook(&req.user_id, req.event_id, req.event)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
