//! Claim shapes and the principal derived from them.

use serde::{Deserialize, Serialize};

/// Claims minted and verified for the internal (HS256) issuer. Field names
/// and semantics are fixed by the login/signup spec: `sub, email, nickname,
/// provider=local, role, scope, iat, nbf, exp, token_use=access`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternalClaims {
    pub sub: String,
    pub email: String,
    pub nickname: String,
    pub provider: String,
    pub role: String,
    pub scope: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub token_use: String,
    pub iss: String,
    pub aud: String,
}

/// Claims expected from the external identity provider. Only the fields the
/// authorizer checks are modeled strictly; anything else in the token is
/// ignored rather than rejected, since we don't control that issuer's shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    pub exp: i64,
    #[serde(default)]
    pub nbf: Option<i64>,
    #[serde(default)]
    pub token_use: Option<String>,
    pub iss: String,
    #[serde(default)]
    pub aud: Option<serde_json::Value>,
}

/// The principal derived by the authorizer from either issuer's claims
/// (spec §4.3 step 4): `{ sub, provider, email?, role?, nickname? }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub sub: String,
    pub provider: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub nickname: Option<String>,
}

impl Principal {
    pub fn is_local(&self) -> bool {
        self.provider == "local"
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.role.as_deref() == Some(role)
    }
}

impl From<InternalClaims> for Principal {
    fn from(claims: InternalClaims) -> Self {
        Self {
            sub: claims.sub,
            provider: claims.provider,
            email: Some(claims.email),
            role: Some(claims.role),
            nickname: Some(claims.nickname),
        }
    }
}

impl From<ExternalClaims> for Principal {
    fn from(claims: ExternalClaims) -> Self {
        Self {
            sub: claims.sub,
            provider: "external".to_string(),
            email: claims.email,
            role: claims.role,
            nickname: claims.nickname,
        }
    }
}

/// Deny reasons the authorizer surfaces on a failed validation (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    InvalidToken,
    Expired,
    WrongAudience,
    UnknownIssuer,
    JwksUnreachable,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::InvalidToken => "invalid_token",
            DenyReason::Expired => "expired",
            DenyReason::WrongAudience => "wrong_audience",
            DenyReason::UnknownIssuer => "unknown_issuer",
            DenyReason::JwksUnreachable => "jwks_unreachable",
        }
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
