//! Signed, single-use tokens for email confirmation and password reset
//! (spec §4.5 `ConfirmEmail`/`RequestPasswordReset`).
//!
//! Each token is bound to a user id, a purpose (so a confirmation token
//! can't be replayed as a reset token), and an expiry. Signed with a keyed
//! BLAKE3 hash over the internal issuer's HMAC secret — reusing the crypto
//! primitive already in the dependency tree rather than adding `hmac`/`sha2`
//! for one extra use.

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::auth::authorizer::now_unix;
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenPurpose {
    EmailConfirmation,
    PasswordReset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Payload {
    user_id: String,
    purpose: TokenPurpose,
    expires_at: i64,
}

pub struct SingleUseTokenIssuer {
    key: [u8; 32],
}

impl SingleUseTokenIssuer {
    /// Derives a signing key from the configured HMAC secret. Using a
    /// distinct keyed hash (rather than the raw secret) keeps single-use
    /// tokens unforgeable even by something that only knows the access
    /// token's signing key through a different code path.
    pub fn new(hmac_secret: &str) -> Self {
        let key = blake3::derive_key("questforge single-use token v1", hmac_secret.as_bytes());
        Self { key }
    }

    pub fn issue(&self, user_id: &str, purpose: TokenPurpose, ttl_secs: i64) -> String {
        let payload = Payload {
            user_id: user_id.to_string(),
            purpose,
            expires_at: now_unix() + ttl_secs,
        };
        let payload_json = serde_json::to_vec(&payload).expect("payload always serializes");
        let payload_b64 = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&payload_json);
        let signature = blake3::keyed_hash(&self.key, payload_json.as_slice());
        format!("{payload_b64}.{}", signature.to_hex())
    }

    /// Verifies signature, purpose, and expiry; returns the bound user id.
    pub fn verify(&self, token: &str, expected_purpose: TokenPurpose) -> Result<String, Error> {
        let (payload_b64, signature_hex) = token
            .split_once('.')
            .ok_or_else(|| Error::validation("malformed token"))?;

        let payload_json = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| Error::validation("malformed token"))?;

        let expected_signature = blake3::keyed_hash(&self.key, &payload_json);
        if expected_signature.to_hex().as_str() != signature_hex {
            return Err(Error::validation("invalid token signature"));
        }

        let payload: Payload = serde_json::from_slice(&payload_json)
            .map_err(|_| Error::validation("malformed token"))?;

        if payload.purpose != expected_purpose {
            return Err(Error::validation("token purpose mismatch"));
        }
        if payload.expires_at < now_unix() {
            return Err(Error::Gone("token expired".to_string()));
        }

        Ok(payload.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies_for_matching_purpose() {
        let issuer = SingleUseTokenIssuer::new("secret");
        let token = issuer.issue("user-1", TokenPurpose::EmailConfirmation, 3600);
        let user_id = issuer
            .verify(&token, TokenPurpose::EmailConfirmation)
            .unwrap();
        assert_eq!(user_id, "user-1");
    }

    #[test]
    fn token_rejected_for_wrong_purpose() {
        let issuer = SingleUseTokenIssuer::new("secret");
        let token = issuer.issue("user-1", TokenPurpose::EmailConfirmation, 3600);
        assert!(issuer.verify(&token, TokenPurpose::PasswordReset).is_err());
    }

    #[test]
    fn expired_token_is_gone() {
        let issuer = SingleUseTokenIssuer::new("secret");
        let token = issuer.issue("user-1", TokenPurpose::PasswordReset, -1);
        let err = issuer.verify(&token, TokenPurpose::PasswordReset).unwrap_err();
        assert!(matches!(err, Error::Gone(_)));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let issuer = SingleUseTokenIssuer::new("secret");
        let token = issuer.issue("user-1", TokenPurpose::EmailConfirmation, 3600);
        let mut parts = token.splitn(2, '.');
        let payload = parts.next().unwrap();
        let tampered = format!("{payload}deadbeef");
        assert!(issuer
            .verify(&tampered, TokenPurpose::EmailConfirmation)
            .is_err());
    }
}
