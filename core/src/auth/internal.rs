//! Mints internal (HS256) access tokens on login/signup.

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

use crate::auth::authorizer::now_unix;
use crate::auth::claims::InternalClaims;
use crate::auth::config::InternalIssuerConfig;
use crate::error::Error;

#[derive(Clone)]
pub struct TokenIssuer {
    config: InternalIssuerConfig,
    encoding_key: EncodingKey,
}

impl TokenIssuer {
    pub fn new(config: InternalIssuerConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.hmac_secret.as_bytes());
        Self {
            config,
            encoding_key,
        }
    }

    /// Issue a 1h access token for a confirmed local user (spec §4.5 `Login`).
    pub fn issue_access_token(
        &self,
        user_id: &str,
        email: &str,
        nickname: &str,
        role: &str,
    ) -> Result<String, Error> {
        let now = now_unix();
        let claims = InternalClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            nickname: nickname.to_string(),
            provider: "local".to_string(),
            role: role.to_string(),
            scope: "full".to_string(),
            iat: now,
            nbf: now,
            exp: now + self.config.access_token_ttl_secs,
            token_use: "access".to_string(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| Error::Internal(format!("failed to sign access token: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_carries_one_hour_expiry() {
        let config = InternalIssuerConfig {
            hmac_secret: "secret".into(),
            access_token_ttl_secs: 3600,
            ..InternalIssuerConfig::default()
        };
        let issuer = TokenIssuer::new(config);
        let token = issuer
            .issue_access_token("u1", "a@example.com", "nick", "member")
            .unwrap();
        assert!(!token.is_empty());
    }
}
