//! Composition root: wires every C1-C12 collaborator from `Config`, builds
//! the REST + WebSocket router, and hands it to `questforge_core::Server`.

mod entities;
mod graphql;
mod handlers;
mod mailer;
mod payment;
mod services;

use std::str::FromStr;
use std::sync::Arc;

use axum::Router;

use questforge_core::auth::{Authorizer, PasswordHasher, SingleUseTokenIssuer, TokenIssuer};
use questforge_core::config::Config;
use questforge_core::error::Error;
use questforge_core::health::{HealthState, ReadinessProbe};
use questforge_core::ids::{TypedId, UserId};
use questforge_core::lockout::LoginLockout;
use questforge_core::middleware::{CedarAuthz, RateLimiter};
use questforge_core::observability::{init_tracing, shutdown_tracing};
use questforge_core::store::memory::MemoryStore;
use questforge_core::store::StoreClient;
use questforge_core::websocket::{RoomManager, SharedRoomManager};
use questforge_core::Server;

use mailer::{build_mailer, Mailer};
use payment::{build_gateway, PaymentGateway};
use services::{
    CollaborationService, GoalService, GuildService, MessagingService, QuestService,
    SubscriptionService, UserService, WaitlistService,
};

/// Shared handles every REST/GraphQL resolver closes over.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserService>,
    pub goals: Arc<GoalService>,
    pub quests: Arc<QuestService>,
    pub guilds: Arc<GuildService>,
    pub collaboration: Arc<CollaborationService>,
    pub messaging: Arc<MessagingService>,
    pub subscriptions: Arc<SubscriptionService>,
    pub waitlist: Arc<WaitlistService>,
    pub mailer: Arc<dyn Mailer>,
    pub payment: Arc<dyn PaymentGateway>,
    pub authorizer: Arc<Authorizer>,
    pub rate_limiter: RateLimiter,
    pub rooms: SharedRoomManager,
}

/// Resolves the caller's typed user id out of the principal a request's
/// `authz_layer` pass already put in extensions; a malformed `sub` can only
/// mean a token was minted by something other than this service.
pub fn principal_user_id(sub: &str) -> Result<TypedId<UserId>, Error> {
    TypedId::from_str(sub).map_err(|_| Error::Internal("principal sub is not a valid user id".into()))
}

struct StoreReadinessProbe {
    store: Arc<dyn StoreClient>,
}

#[async_trait::async_trait]
impl ReadinessProbe for StoreReadinessProbe {
    fn name(&self) -> &str {
        "store"
    }

    async fn check(&self) -> Result<(), String> {
        self.store
            .get("HEALTHCHECK", "HEALTHCHECK")
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    init_tracing(&config)?;

    let store: Arc<dyn StoreClient> = Arc::new(MemoryStore::new());

    let hasher = PasswordHasher::new(config.auth.password.clone());
    let token_issuer = TokenIssuer::new(config.auth.internal.clone());
    let single_use = SingleUseTokenIssuer::new(&config.auth.internal.hmac_secret);
    let lockout = LoginLockout::new(config.lockout.clone(), store.clone());
    let authorizer = Arc::new(Authorizer::new(config.auth.clone()));
    let rate_limiter = RateLimiter::new(config.rate_limit.clone(), store.clone());
    let cedar = CedarAuthz::new(config.cedar.clone()).await?;

    let mailer: Arc<dyn Mailer> = Arc::from(build_mailer(config.mailer.clone()));
    let payment: Arc<dyn PaymentGateway> = Arc::from(build_gateway(config.payment.clone()));

    let rooms: SharedRoomManager = Arc::new(RoomManager::spawn(config.websocket.rooms.clone()));

    let guilds = Arc::new(GuildService::new(store.clone(), config.guild_analytics.clone()));
    let state = AppState {
        users: Arc::new(UserService::new(
            store.clone(),
            hasher,
            token_issuer,
            single_use,
            lockout,
            config.signup.clone(),
            config.founder_pass.clone(),
        )),
        goals: Arc::new(GoalService::new(store.clone())),
        quests: Arc::new(QuestService::new(store.clone())),
        collaboration: Arc::new(CollaborationService::new(store.clone())),
        messaging: Arc::new(MessagingService::new(store.clone(), rooms.clone(), guilds.clone())),
        subscriptions: Arc::new(SubscriptionService::new(
            store.clone(),
            payment.clone(),
            config.founder_pass.clone(),
        )),
        waitlist: Arc::new(WaitlistService::new(store.clone())),
        mailer,
        payment,
        authorizer: authorizer.clone(),
        rate_limiter: rate_limiter.clone(),
        rooms,
        guilds,
    };

    let health_state = Arc::new(
        HealthState::new(config.service.name.clone())
            .with_probe(Arc::new(StoreReadinessProbe { store: store.clone() })),
    );

    let app: Router = handlers::router(state, authorizer, rate_limiter, cedar)
        .merge(
            Router::new()
                .route("/health", axum::routing::get(questforge_core::health::health))
                .route("/ready", axum::routing::get(questforge_core::health::readiness))
                .with_state(health_state),
        );

    Server::new(config).serve(app).await?;
    shutdown_tracing();
    Ok(())
}
