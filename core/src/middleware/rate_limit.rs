//! Store-backed rate limiting middleware (C4).
//!
//! Two families of sliding-window counters, both persisted as store rows
//! rather than kept in a dedicated Redis deployment: **per-IP** for
//! anonymous endpoints (waitlist subscribe, login, password reset) and
//! **per-principal** for authenticated write-heavy endpoints (invite send,
//! comment create, chat send). Each family uses the same row shape —
//! `RL#<scope>#<key> / WINDOW#<bucket>` (spec §4.4) — incremented with a
//! single atomic [`SetOp::Increment`], so concurrent requests against the
//! same bucket can't race past the limit.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::auth::Principal;
use crate::error::Error;
use crate::store::{keys, Condition, SetOp, StoreClient, StoreError};

/// One named quota: how many requests per window, and whether a store
/// hiccup should fail the request open or closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quota {
    pub limit: u32,
    pub window_secs: u64,
    /// When true, a `StoreError::Transient` is treated as "allow" rather
    /// than "deny" — spec §4.4 only permits fail-open for this one error
    /// kind, never for `Throttled`/`Fatal`.
    #[serde(default)]
    pub best_effort: bool,
}

impl Quota {
    pub const fn new(limit: u32, window_secs: u64, best_effort: bool) -> Self {
        Self {
            limit,
            window_secs,
            best_effort,
        }
    }
}

/// Rate limit configuration: the five named scopes the spec calls out by
/// name, each independently tunable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct RateLimitConfig {
    #[serde(default = "default_waitlist")]
    pub waitlist: Quota,
    #[serde(default = "default_login")]
    pub login: Quota,
    #[serde(default = "default_invites")]
    pub invites: Quota,
    #[serde(default = "default_comments")]
    pub comments: Quota,
    #[serde(default = "default_chat")]
    pub chat: Quota,
}

fn default_waitlist() -> Quota {
    Quota::new(5, 60, false)
}
fn default_login() -> Quota {
    Quota::new(10, 60, false)
}
fn default_invites() -> Quota {
    Quota::new(20, 3600, false)
}
fn default_comments() -> Quota {
    Quota::new(100, 3600, false)
}
fn default_chat() -> Quota {
    Quota::new(60, 60, true)
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            waitlist: default_waitlist(),
            login: default_login(),
            invites: default_invites(),
            comments: default_comments(),
            chat: default_chat(),
        }
    }
}

/// Which named quota a route is gated by, and whether it's keyed by
/// client IP or by the authenticated principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Waitlist,
    Login,
    Invites,
    Comments,
    Chat,
}

impl Scope {
    fn name(self) -> &'static str {
        match self {
            Scope::Waitlist => "waitlist",
            Scope::Login => "login",
            Scope::Invites => "invites",
            Scope::Comments => "comments",
            Scope::Chat => "chat",
        }
    }

    fn keyed_by_ip(self) -> bool {
        matches!(self, Scope::Waitlist | Scope::Login)
    }

    fn quota(self, config: &RateLimitConfig) -> Quota {
        match self {
            Scope::Waitlist => config.waitlist.clone(),
            Scope::Login => config.login.clone(),
            Scope::Invites => config.invites.clone(),
            Scope::Comments => config.comments.clone(),
            Scope::Chat => config.chat.clone(),
        }
    }
}

/// Store-backed sliding-window limiter.
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    store: Arc<dyn StoreClient>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, store: Arc<dyn StoreClient>) -> Self {
        Self { config, store }
    }

    /// Checks and increments the counter for `scope`/`key` in the current
    /// window. Returns `Ok(())` if the request is allowed.
    pub async fn check(&self, scope: Scope, key: &str) -> Result<(), Error> {
        let quota = scope.quota(&self.config);
        let now_secs = now_unix();
        let bucket = now_secs / quota.window_secs as i64;
        let (pk, sk) = keys::rate_limit_bucket(scope.name(), key, bucket);

        let result = self
            .store
            .update(
                &pk,
                &sk,
                vec![SetOp::Set("sk".into(), serde_json::json!(sk)), SetOp::Increment("count".into(), 1)],
                None,
            )
            .await;

        let item = match result {
            Ok(item) => item,
            Err(StoreError::NotFound) => {
                // First request in this window — seed the row, then retry
                // the increment so concurrent first-requests still race
                // through one atomic counter rather than two writers both
                // believing they created row.
                let seed = serde_json::json!({ "sk": sk, "count": 0 })
                    .as_object()
                    .cloned()
                    .unwrap_or_default();
                match self
                    .store
                    .put(&pk, &sk, seed, Some(Condition::AttributeNotExists("count".into())))
                    .await
                {
                    Ok(()) | Err(StoreError::Conflict(_)) => {}
                    Err(e) => return self.on_store_error(quota.best_effort, e),
                }
                match self
                    .store
                    .update(&pk, &sk, vec![SetOp::Increment("count".into(), 1)], None)
                    .await
                {
                    Ok(item) => item,
                    Err(e) => return self.on_store_error(quota.best_effort, e),
                }
            }
            Err(e) => return self.on_store_error(quota.best_effort, e),
        };

        let count = item.get("count").and_then(|v| v.as_i64()).unwrap_or(0);
        if count > quota.limit as i64 {
            warn!(
                scope = scope.name(),
                key = key,
                count = count,
                limit = quota.limit,
                "rate limit exceeded"
            );
            return Err(Error::TooManyRequests {
                retry_after_secs: quota.window_secs,
            });
        }

        Ok(())
    }

    /// Spec §4.4: fail open only on `Transient` when the scope is marked
    /// `best_effort`; every other kind (and `best_effort = false`) fails
    /// closed via the normal `StoreError -> Error` mapping.
    fn on_store_error(&self, best_effort: bool, err: StoreError) -> Result<(), Error> {
        if best_effort && matches!(err, StoreError::Transient(_)) {
            return Ok(());
        }
        Err(err.into())
    }
}

/// Axum middleware: resolves the key for `scope` (client IP or principal
/// `sub`) and enforces it before calling through.
pub async fn rate_limit_layer(
    scope: Scope,
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, Error> {
    let key = if scope.keyed_by_ip() {
        extract_client_ip(request.headers()).unwrap_or_else(|| "unknown".to_string())
    } else {
        request
            .extensions()
            .get::<Principal>()
            .map(|p| p.sub.clone())
            .ok_or_else(|| Error::Unauthenticated("missing principal for rate limit".into()))?
    };

    limiter.check(scope, &key).await?;
    Ok(next.run(request).await)
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

fn now_unix() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    #[tokio::test]
    async fn sixth_waitlist_request_in_window_is_denied() {
        let limiter = RateLimiter::new(RateLimitConfig::default(), Arc::new(MemoryStore::new()));
        for _ in 0..5 {
            limiter.check(Scope::Waitlist, "1.2.3.4").await.unwrap();
        }
        let err = limiter.check(Scope::Waitlist, "1.2.3.4").await.unwrap_err();
        assert!(matches!(err, Error::TooManyRequests { .. }));
    }

    #[tokio::test]
    async fn distinct_keys_have_independent_counters() {
        let limiter = RateLimiter::new(RateLimitConfig::default(), Arc::new(MemoryStore::new()));
        for _ in 0..5 {
            limiter.check(Scope::Waitlist, "1.2.3.4").await.unwrap();
        }
        // A different IP starts fresh.
        limiter.check(Scope::Waitlist, "5.6.7.8").await.unwrap();
    }

    #[tokio::test]
    async fn best_effort_scope_fails_open_on_transient_store_error() {
        struct AlwaysTransient;

        #[async_trait::async_trait]
        impl StoreClient for AlwaysTransient {
            async fn put(
                &self,
                _pk: &str,
                _sk: &str,
                _item: crate::store::Item,
                _condition: Option<Condition>,
            ) -> Result<(), StoreError> {
                Err(StoreError::Transient("down".into()))
            }
            async fn get(&self, _pk: &str, _sk: &str) -> Result<Option<crate::store::Item>, StoreError> {
                Err(StoreError::Transient("down".into()))
            }
            async fn query(
                &self,
                _input: crate::store::QueryInput,
            ) -> Result<crate::store::QueryResult, StoreError> {
                Err(StoreError::Transient("down".into()))
            }
            async fn update(
                &self,
                _pk: &str,
                _sk: &str,
                _sets: Vec<SetOp>,
                _condition: Option<Condition>,
            ) -> Result<crate::store::Item, StoreError> {
                Err(StoreError::Transient("down".into()))
            }
            async fn transact_write(&self, _ops: Vec<crate::store::TransactOp>) -> Result<(), StoreError> {
                Err(StoreError::Transient("down".into()))
            }
            async fn delete(
                &self,
                _pk: &str,
                _sk: &str,
                _condition: Option<Condition>,
            ) -> Result<(), StoreError> {
                Err(StoreError::Transient("down".into()))
            }
        }

        let limiter = RateLimiter::new(RateLimitConfig::default(), Arc::new(AlwaysTransient));
        assert!(limiter.check(Scope::Chat, "user-1").await.is_ok());
        assert!(limiter.check(Scope::Login, "1.2.3.4").await.is_err());
    }
}
