//! Authentication configuration: the dual-issuer authorizer and password
//! hashing parameters.

use serde::{Deserialize, Serialize};

/// Top-level auth configuration, nested under `[auth]` in the service config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub internal: InternalIssuerConfig,
    #[serde(default)]
    pub external: ExternalIssuerConfig,
    #[serde(default)]
    pub password: PasswordConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            internal: InternalIssuerConfig::default(),
            external: ExternalIssuerConfig::default(),
            password: PasswordConfig::default(),
        }
    }
}

/// The internal (first-party) issuer: HS256, one shared secret, cached for
/// the process lifetime once read from configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternalIssuerConfig {
    #[serde(default = "default_internal_issuer")]
    pub issuer: String,
    #[serde(default = "default_audience")]
    pub audience: String,
    /// HMAC signing secret. In production this is expected to come from the
    /// environment (`QF_AUTH__INTERNAL__HMAC_SECRET`), never committed.
    #[serde(default)]
    pub hmac_secret: String,
    #[serde(default = "default_access_token_ttl_secs")]
    pub access_token_ttl_secs: i64,
}

impl Default for InternalIssuerConfig {
    fn default() -> Self {
        Self {
            issuer: default_internal_issuer(),
            audience: default_audience(),
            hmac_secret: String::new(),
            access_token_ttl_secs: default_access_token_ttl_secs(),
        }
    }
}

/// The external identity provider: RS256 verified against a JWKS endpoint,
/// keys cached with a 5-minute TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalIssuerConfig {
    #[serde(default = "default_external_issuer")]
    pub issuer: String,
    #[serde(default = "default_jwks_url")]
    pub jwks_url: String,
    #[serde(default = "default_audience")]
    pub audience: String,
    #[serde(default = "default_jwks_cache_ttl_secs")]
    pub jwks_cache_ttl_secs: u64,
}

impl Default for ExternalIssuerConfig {
    fn default() -> Self {
        Self {
            issuer: default_external_issuer(),
            jwks_url: default_jwks_url(),
            audience: default_audience(),
            jwks_cache_ttl_secs: default_jwks_cache_ttl_secs(),
        }
    }
}

/// Password hashing parameters. The spec requires bcrypt specifically, cost
/// >= 10 — unlike most of this crate's ambient stack, this one is pinned by
/// the spec rather than inherited from the framework this crate descends
/// from (see DESIGN.md).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordConfig {
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
    #[serde(default = "default_min_length")]
    pub min_password_length: usize,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: default_bcrypt_cost(),
            min_password_length: default_min_length(),
        }
    }
}

fn default_internal_issuer() -> String {
    "questforge".to_string()
}

fn default_external_issuer() -> String {
    "https://auth.questforge.example".to_string()
}

fn default_audience() -> String {
    "questforge-api".to_string()
}

fn default_jwks_url() -> String {
    "https://auth.questforge.example/.well-known/jwks.json".to_string()
}

fn default_jwks_cache_ttl_secs() -> u64 {
    300
}

fn default_access_token_ttl_secs() -> i64 {
    3600
}

fn default_bcrypt_cost() -> u32 {
    10
}

fn default_min_length() -> usize {
    8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bcrypt_cost_defaults_to_spec_minimum() {
        assert_eq!(PasswordConfig::default().bcrypt_cost, 10);
    }

    #[test]
    fn internal_access_token_ttl_defaults_to_one_hour() {
        assert_eq!(InternalIssuerConfig::default().access_token_ttl_secs, 3600);
    }

    #[test]
    fn jwks_cache_ttl_defaults_to_five_minutes() {
        assert_eq!(ExternalIssuerConfig::default().jwks_cache_ttl_secs, 300);
    }
}
