//! JWKS fetch and cache for the external issuer.
//!
//! Keys are cached for a configured TTL (5 minutes per spec default).
//! Concurrent callers that all miss the cache at once share one in-flight
//! fetch rather than hammering the identity provider — the same
//! single-flight shape the teacher's token-revocation cache uses for Redis
//! round-trips, here applied to an HTTP round-trip instead.

use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::JwkSet;
use tokio::sync::Mutex;

use crate::auth::claims::DenyReason;

struct Cached {
    jwks: JwkSet,
    fetched_at: Instant,
}

pub struct JwksCache {
    url: String,
    ttl: Duration,
    http: reqwest::Client,
    state: Arc<Mutex<Option<Cached>>>,
}

impl JwksCache {
    pub fn new(url: impl Into<String>, ttl: Duration) -> Self {
        Self {
            url: url.into(),
            ttl,
            http: reqwest::Client::new(),
            state: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns the cached JWKS, refreshing it if stale or absent. Holding
    /// the mutex across the refresh (rather than releasing and racing)
    /// single-flights concurrent misses onto one fetch.
    pub async fn get(&self) -> Result<JwkSet, DenyReason> {
        let mut guard = self.state.lock().await;

        let stale = match &*guard {
            Some(cached) => cached.fetched_at.elapsed() >= self.ttl,
            None => true,
        };

        if stale {
            let jwks = self.fetch().await?;
            *guard = Some(Cached {
                jwks,
                fetched_at: Instant::now(),
            });
        }

        Ok(guard.as_ref().expect("just populated").jwks.clone())
    }

    async fn fetch(&self) -> Result<JwkSet, DenyReason> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|_| DenyReason::JwksUnreachable)?;

        if !response.status().is_success() {
            return Err(DenyReason::JwksUnreachable);
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|_| DenyReason::JwksUnreachable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_url_surfaces_as_jwks_unreachable() {
        let cache = JwksCache::new("http://127.0.0.1:0/jwks.json", Duration::from_secs(300));
        let err = cache.get().await.unwrap_err();
        assert_eq!(err, DenyReason::JwksUnreachable);
    }
}
