//! REST surface (spec §6): one module per resource group, mounted behind
//! the authz/Cedar/rate-limit middleware stack built here.

mod auth;
mod collaboration;
mod goals;
mod guilds;
mod profile;
mod quests;
mod subscriptions;
mod waitlist;
mod websocket;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::middleware::{from_fn_with_state, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{extract::Extension, extract::Request, extract::State, Router};

use questforge_core::auth::Authorizer;
use questforge_core::middleware::rate_limit::Scope;
use questforge_core::middleware::{authz_layer, CedarAuthz, RateLimiter};

use crate::AppState;

/// Wrapper around [`questforge_core::middleware::rate_limit::rate_limit_layer`]
/// fixing the scope per mount point, since `from_fn_with_state` needs a
/// plain `fn(State<S>, Request, Next) -> Future` shape.
macro_rules! rate_limit_mw {
    ($name:ident, $scope:expr) => {
        async fn $name(
            state: State<RateLimiter>,
            req: Request,
            next: Next,
        ) -> Result<Response, questforge_core::error::Error> {
            questforge_core::middleware::rate_limit::rate_limit_layer($scope, state, req, next).await
        }
    };
}

rate_limit_mw!(waitlist_rate_limit, Scope::Waitlist);
rate_limit_mw!(login_rate_limit, Scope::Login);
rate_limit_mw!(invites_rate_limit, Scope::Invites);
rate_limit_mw!(comments_rate_limit, Scope::Comments);
rate_limit_mw!(chat_rate_limit, Scope::Chat);

async fn not_found() -> impl IntoResponse {
    StatusCode::NOT_FOUND
}

/// Builds the full application router: unauthenticated routes (waitlist,
/// signup, login, password reset, webhooks), bearer-gated routes behind
/// `authz_layer` + Cedar, and the websocket upgrade route.
pub fn router(
    state: AppState,
    authorizer: Arc<Authorizer>,
    rate_limiter: RateLimiter,
    cedar: CedarAuthz,
) -> Router {
    // `/graphql` sits outside `authz_layer`: public fields (`isEmailAvailable`,
    // `isNicknameAvailable`) must resolve for anonymous callers, and
    // `graphql_handler` does its own optional bearer-token lookup for the
    // principal-gated fields instead.
    let schema = crate::graphql::build_schema(state.clone());
    let graphql = Router::new()
        .route(
            "/graphql",
            post(crate::graphql::graphql_handler)
                .get(crate::graphql::build_subscription_handler(authorizer.clone(), schema.clone())),
        )
        .layer(Extension(schema));

    let public = Router::new()
        .route("/waitlist/subscribe", post(waitlist::subscribe))
        .route_layer(from_fn_with_state(rate_limiter.clone(), waitlist_rate_limit))
        .route("/auth/signup", post(auth::signup))
        .route("/auth/confirm", post(auth::confirm))
        .route("/auth/password-reset/request", post(auth::request_password_reset))
        .route("/auth/password-reset/confirm", post(auth::confirm_password_reset))
        .route("/webhooks/stripe", post(subscriptions::stripe_webhook))
        .merge(
            Router::new()
                .route("/auth/login", post(auth::login))
                .route_layer(from_fn_with_state(rate_limiter.clone(), login_rate_limit)),
        );

    let authenticated = Router::new()
        .route("/profile", get(profile::get_profile).put(profile::update_profile))
        .route("/goals", get(goals::list_goals).post(goals::create_goal))
        .route("/goals/{id}", get(goals::get_goal).put(goals::update_goal).delete(goals::archive_goal))
        .route("/goals/{id}/tasks", get(goals::list_tasks).post(goals::add_task))
        .route(
            "/goals/{id}/tasks/{task_id}",
            put(goals::update_task).delete(goals::delete_task),
        )
        .route("/goals/{id}/tasks/{task_id}/toggle", post(goals::toggle_task))
        .route("/quests", get(quests::list_quests).post(quests::create_quest))
        .route("/quests/{id}", get(quests::get_quest))
        .route("/quests/{id}/start", post(quests::start))
        .route("/quests/{id}/complete", post(quests::complete))
        .route("/quests/{id}/cancel", post(quests::cancel))
        .route("/quests/{id}/fail", post(quests::fail))
        .route("/quests/{id}/increment", post(quests::increment))
        .route("/guilds", post(guilds::create_guild))
        .route("/guilds/{id}", get(guilds::get_guild))
        .route(
            "/guilds/{id}/members",
            get(guilds::list_members).post(guilds::join).delete(guilds::leave),
        )
        .route("/guilds/{id}/quests", post(guilds::add_guild_quest))
        .route(
            "/guilds/{id}/quests/{quest_id}/complete",
            post(guilds::record_completion),
        )
        .route(
            "/guilds/{id}/quests/{quest_id}/progress",
            get(guilds::guild_quest_progress),
        )
        .route("/guilds/{id}/activities", get(guilds::activities))
        .route(
            "/collaborations/invites",
            post(collaboration::send_invite),
        )
        .route(
            "/collaborations/invites/{id}/accept",
            post(collaboration::accept_invite),
        )
        .route(
            "/collaborations/invites/{id}/decline",
            post(collaboration::decline_invite),
        )
        .route("/collaborations/comments", post(collaboration::add_comment))
        .route(
            "/collaborations/comments/{id}/reactions",
            post(collaboration::toggle_reaction),
        )
        .route(
            "/collaborations/resources/{resource_type}/{id}/comments",
            get(collaboration::list_comments),
        )
        .route(
            "/subscriptions/current",
            get(subscriptions::current),
        )
        .route(
            "/subscriptions/create-checkout",
            post(subscriptions::create_checkout),
        )
        .route("/subscriptions/cancel", post(subscriptions::cancel))
        .route("/subscriptions/portal", post(subscriptions::portal))
        .route("/credits/balance", get(subscriptions::credit_balance))
        .route("/credits/topup", post(subscriptions::credit_topup))
        .merge(
            Router::new()
                .route("/collaborations/comments", post(collaboration::add_comment))
                .route_layer(from_fn_with_state(rate_limiter.clone(), comments_rate_limit)),
        )
        .merge(
            Router::new()
                .route("/collaborations/invites", post(collaboration::send_invite))
                .route_layer(from_fn_with_state(rate_limiter.clone(), invites_rate_limit)),
        )
        .layer(from_fn_with_state(authorizer, authz_layer))
        .layer(from_fn_with_state(cedar, CedarAuthz::middleware));

    let ws = Router::new()
        .route("/ws", get(websocket::ws_handler))
        .route_layer(from_fn_with_state(rate_limiter, chat_rate_limit));

    public
        .merge(authenticated)
        .merge(ws)
        .merge(graphql)
        .fallback(not_found)
        .with_state(state)
}
