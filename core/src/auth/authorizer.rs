//! Dual-issuer request authorizer (C3).
//!
//! Verifies a bearer token against either the internal HS256 issuer (secret
//! cached for the process lifetime) or the external RS256 issuer (keys
//! fetched from its JWKS endpoint and cached for 5 minutes), then derives a
//! [`Principal`] from whichever claim set validated. Invoked once per HTTP
//! request and once per WebSocket upgrade — see `middleware::authz`.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::auth::claims::{DenyReason, ExternalClaims, InternalClaims, Principal};
use crate::auth::config::AuthConfig;
use crate::auth::jwks::JwksCache;

const CLOCK_SKEW_SECS: u64 = 60;

#[derive(Deserialize)]
struct UnverifiedPayload {
    iss: Option<String>,
}

pub struct Authorizer {
    config: AuthConfig,
    internal_key: DecodingKey,
    jwks: JwksCache,
}

impl Authorizer {
    pub fn new(config: AuthConfig) -> Self {
        let internal_key = DecodingKey::from_secret(config.internal.hmac_secret.as_bytes());
        let jwks = JwksCache::new(
            config.external.jwks_url.clone(),
            Duration::from_secs(config.external.jwks_cache_ttl_secs),
        );
        Self {
            config,
            internal_key,
            jwks,
        }
    }

    /// Run the full validation algorithm and derive a principal, or a deny
    /// reason (spec §4.3).
    pub async fn authorize(&self, token: &str) -> Result<Principal, DenyReason> {
        let issuer = peek_issuer(token).ok_or(DenyReason::InvalidToken)?;

        if issuer == self.config.internal.issuer {
            self.authorize_internal(token)
        } else {
            self.authorize_external(token, &issuer).await
        }
    }

    fn authorize_internal(&self, token: &str) -> Result<Principal, DenyReason> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.internal.issuer]);
        validation.set_audience(&[&self.config.internal.audience]);
        validation.leeway = CLOCK_SKEW_SECS;

        let data = decode::<InternalClaims>(token, &self.internal_key, &validation)
            .map_err(map_jwt_error)?;

        if data.claims.token_use != "access" {
            return Err(DenyReason::InvalidToken);
        }

        Ok(data.claims.into())
    }

    async fn authorize_external(&self, token: &str, issuer: &str) -> Result<Principal, DenyReason> {
        if issuer != self.config.external.issuer {
            return Err(DenyReason::UnknownIssuer);
        }

        let header = decode_header(token).map_err(|_| DenyReason::InvalidToken)?;
        let kid = header.kid.ok_or(DenyReason::InvalidToken)?;

        let jwks = self.jwks.get().await?;
        let jwk = jwks
            .find(&kid)
            .ok_or(DenyReason::InvalidToken)?;
        let decoding_key =
            DecodingKey::from_jwk(jwk).map_err(|_| DenyReason::InvalidToken)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.config.external.issuer]);
        validation.set_audience(&[&self.config.external.audience]);
        validation.leeway = CLOCK_SKEW_SECS;

        let data = decode::<ExternalClaims>(token, &decoding_key, &validation)
            .map_err(map_jwt_error)?;

        if data.claims.token_use.as_deref() != Some("access") {
            return Err(DenyReason::InvalidToken);
        }

        Ok(data.claims.into())
    }
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> DenyReason {
    use jsonwebtoken::errors::ErrorKind;
    match err.kind() {
        ErrorKind::ExpiredSignature => DenyReason::Expired,
        ErrorKind::InvalidAudience => DenyReason::WrongAudience,
        ErrorKind::InvalidIssuer => DenyReason::UnknownIssuer,
        _ => DenyReason::InvalidToken,
    }
}

/// Reads the `iss` claim out of a JWT's payload segment without verifying
/// its signature — just enough to decide which issuer's keys to verify
/// against next. Never trust anything else read this way.
fn peek_issuer(token: &str) -> Option<String> {
    let payload_b64 = token.split('.').nth(1)?;
    let payload_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64)
        .ok()?;
    let payload: UnverifiedPayload = serde_json::from_slice(&payload_bytes).ok()?;
    payload.iss
}

/// Current unix time, used by token generation (validation itself is
/// handled entirely by `jsonwebtoken`'s `exp`/`nbf` checks above).
pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::config::{ExternalIssuerConfig, InternalIssuerConfig, PasswordConfig};
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn test_config() -> AuthConfig {
        AuthConfig {
            internal: InternalIssuerConfig {
                issuer: "questforge".into(),
                audience: "questforge-api".into(),
                hmac_secret: "test-secret".into(),
                access_token_ttl_secs: 3600,
            },
            external: ExternalIssuerConfig {
                issuer: "https://auth.example".into(),
                jwks_url: "https://auth.example/.well-known/jwks.json".into(),
                audience: "questforge-api".into(),
                jwks_cache_ttl_secs: 300,
            },
            password: PasswordConfig::default(),
        }
    }

    fn sign_internal(claims: &InternalClaims, secret: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn valid_internal_token_derives_principal() {
        let config = test_config();
        let now = now_unix();
        let claims = InternalClaims {
            sub: "user-1".into(),
            email: "a@example.com".into(),
            nickname: "adventurer".into(),
            provider: "local".into(),
            role: "member".into(),
            scope: "full".into(),
            iat: now,
            nbf: now - 1,
            exp: now + 3600,
            token_use: "access".into(),
            iss: config.internal.issuer.clone(),
            aud: config.internal.audience.clone(),
        };
        let token = sign_internal(&claims, &config.internal.hmac_secret);

        let authorizer = Authorizer::new(config);
        let principal = authorizer.authorize(&token).await.unwrap();
        assert_eq!(principal.sub, "user-1");
        assert_eq!(principal.provider, "local");
    }

    #[tokio::test]
    async fn expired_internal_token_is_denied_as_expired() {
        let config = test_config();
        let now = now_unix();
        let claims = InternalClaims {
            sub: "user-1".into(),
            email: "a@example.com".into(),
            nickname: "adventurer".into(),
            provider: "local".into(),
            role: "member".into(),
            scope: "full".into(),
            iat: now - 7200,
            nbf: now - 7200,
            exp: now - 3600,
            token_use: "access".into(),
            iss: config.internal.issuer.clone(),
            aud: config.internal.audience.clone(),
        };
        let token = sign_internal(&claims, &config.internal.hmac_secret);

        let authorizer = Authorizer::new(config);
        let err = authorizer.authorize(&token).await.unwrap_err();
        assert_eq!(err, DenyReason::Expired);
    }

    #[tokio::test]
    async fn garbage_token_is_denied_as_invalid() {
        let authorizer = Authorizer::new(test_config());
        let err = authorizer.authorize("not-a-jwt").await.unwrap_err();
        assert_eq!(err, DenyReason::InvalidToken);
    }

    #[tokio::test]
    async fn wrong_audience_is_denied() {
        let config = test_config();
        let now = now_unix();
        let claims = InternalClaims {
            sub: "user-1".into(),
            email: "a@example.com".into(),
            nickname: "adventurer".into(),
            provider: "local".into(),
            role: "member".into(),
            scope: "full".into(),
            iat: now,
            nbf: now - 1,
            exp: now + 3600,
            token_use: "access".into(),
            iss: config.internal.issuer.clone(),
            aud: "someone-else".into(),
        };
        let token = sign_internal(&claims, &config.internal.hmac_secret);

        let authorizer = Authorizer::new(config);
        let err = authorizer.authorize(&token).await.unwrap_err();
        assert_eq!(err, DenyReason::WrongAudience);
    }
}
