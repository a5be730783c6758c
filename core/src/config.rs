//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: QF_)
//! 2. Current working directory: ./config.toml
//! 3. System directory: /etc/questforge/{service_name}/config.toml
//! 4. Default values
//!
//! Spec §6 "Configuration sources": "a single startup hook reads from a
//! configuration store (key/value) and environment. Required keys: core
//! table name, guild table name, identity issuer + JWKS URL + audience,
//! internal HMAC secret, payment secret + webhook secret (prod only),
//! mailer endpoint, allowed origins, rate-limit defaults, founder pass
//! list." Each of those lands in one of the sub-structs below.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::AuthConfig;
use crate::error::Result;
use crate::lockout::LockoutConfig;
use crate::middleware::cedar::CedarConfig;
use crate::middleware::rate_limit::RateLimitConfig;
use crate::websocket::WebSocketConfig;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service-level configuration (name, port, log level, environment)
    pub service: ServiceConfig,

    /// Dual-issuer authorizer configuration (C3)
    #[serde(default)]
    pub auth: AuthConfig,

    /// Single wide-row store configuration (C1)
    pub store: StoreConfig,

    /// Rate limiting configuration (C4)
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Login lockout configuration (C4)
    #[serde(default)]
    pub lockout: LockoutConfig,

    /// Cedar route-policy authorization configuration
    #[serde(default)]
    pub cedar: CedarConfig,

    /// CORS configuration
    #[serde(default)]
    pub cors: CorsConfig,

    /// Security header configuration
    #[serde(default)]
    pub security_headers: SecurityHeadersConfig,

    /// Remaining ambient middleware knobs (request tracking, resilience, body limits)
    #[serde(default)]
    pub middleware: MiddlewareConfig,

    /// External mailer collaborator (C5 password reset / invite email; mailer
    /// itself is a Non-goal, only enqueueing a send request is in scope)
    #[serde(default)]
    pub mailer: MailerConfig,

    /// Payment gateway collaborator (C11)
    #[serde(default)]
    pub payment: PaymentConfig,

    /// Founder pass list (C11: lifetime GUILDMASTER grant)
    #[serde(default)]
    pub founder_pass: FounderPassConfig,

    /// Signup-time validation knobs (C5): the closed country allow-list.
    #[serde(default)]
    pub signup: SignupConfig,

    /// Guild weighted member-activity rate coefficients (C8 analytics).
    #[serde(default)]
    pub guild_analytics: GuildAnalyticsConfig,

    /// Realtime chat transport configuration (C10)
    #[serde(default)]
    pub websocket: WebSocketConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Default REST request deadline in seconds (spec §5: 15s REST default)
    #[serde(default = "default_rest_timeout_secs")]
    pub timeout_secs: u64,

    /// Webhook handler deadline in seconds (spec §5: 30s)
    #[serde(default = "default_webhook_timeout_secs")]
    pub webhook_timeout_secs: u64,

    /// Environment (dev, staging, production)
    #[serde(default = "default_environment")]
    pub environment: String,
}

/// Single wide-row store configuration (C1). The reference adapter
/// ([`crate::store::memory::MemoryStore`]) ignores these names; a
/// production adapter backed by a real wide-row store uses them to target
/// the correct tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_table_name")]
    pub table_name: String,
    #[serde(default = "default_guild_table_name")]
    pub guild_table_name: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table_name: default_table_name(),
            guild_table_name: default_guild_table_name(),
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// `permissive` (any origin, dev only), `restrictive` (only
    /// `allowed_origins`), or `disabled`.
    #[serde(default = "default_cors_mode")]
    pub mode: String,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            mode: default_cors_mode(),
            allowed_origins: Vec::new(),
        }
    }
}

/// Security header configuration, consumed by
/// [`crate::middleware::security_headers::apply_security_headers`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityHeadersConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub hsts: bool,
    #[serde(default = "default_hsts_max_age_secs")]
    pub hsts_max_age_secs: u64,
    #[serde(default = "default_true")]
    pub hsts_include_subdomains: bool,
    #[serde(default)]
    pub hsts_preload: bool,
    #[serde(default = "default_true")]
    pub x_content_type_options: bool,
    #[serde(default = "default_x_frame_options")]
    pub x_frame_options: String,
    #[serde(default = "default_true")]
    pub x_xss_protection: bool,
    #[serde(default = "default_referrer_policy")]
    pub referrer_policy: String,
    #[serde(default)]
    pub permissions_policy: Option<String>,
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hsts: true,
            hsts_max_age_secs: default_hsts_max_age_secs(),
            hsts_include_subdomains: true,
            hsts_preload: false,
            x_content_type_options: true,
            x_frame_options: default_x_frame_options(),
            x_xss_protection: true,
            referrer_policy: default_referrer_policy(),
            permissions_policy: None,
        }
    }
}

/// Remaining ambient middleware configuration: request tracking knobs and
/// the circuit breaker/retry parameters used for calls to the identity
/// provider's JWKS endpoint, the mailer, and the payment gateway (spec §5:
/// "every outbound call ... MUST carry a deadline").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiddlewareConfig {
    #[serde(default)]
    pub request_tracking: RequestTrackingConfig,

    #[serde(default)]
    pub resilience: Option<ResilienceConfig>,

    /// Request body size limit in MB
    #[serde(default = "default_body_limit_mb")]
    pub body_limit_mb: usize,

    /// Enable panic recovery middleware
    #[serde(default = "default_true")]
    pub catch_panic: bool,

    /// Enable compression
    #[serde(default = "default_true")]
    pub compression: bool,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            request_tracking: RequestTrackingConfig::default(),
            resilience: None,
            body_limit_mb: default_body_limit_mb(),
            catch_panic: true,
            compression: true,
        }
    }
}

/// Request tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestTrackingConfig {
    /// Enable request ID generation
    #[serde(default = "default_true")]
    pub request_id_enabled: bool,

    /// Request ID header name
    #[serde(default = "default_request_id_header")]
    pub request_id_header: String,

    /// Enable header propagation
    #[serde(default = "default_true")]
    pub propagate_headers: bool,

    /// Enable sensitive header masking in logs
    #[serde(default = "default_true")]
    pub mask_sensitive_headers: bool,
}

impl Default for RequestTrackingConfig {
    fn default() -> Self {
        Self {
            request_id_enabled: true,
            request_id_header: default_request_id_header(),
            propagate_headers: true,
            mask_sensitive_headers: true,
        }
    }
}

/// Resilience configuration (circuit breaker, retry) for calls to the
/// identity provider's JWKS endpoint, mailer, and payment gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    #[serde(default = "default_true")]
    pub circuit_breaker_enabled: bool,

    /// Failure threshold before circuit opens (0.0-1.0)
    #[serde(default = "default_circuit_breaker_threshold")]
    pub circuit_breaker_threshold: f64,

    /// Minimum requests before calculating failure rate
    #[serde(default = "default_circuit_breaker_min_requests")]
    pub circuit_breaker_min_requests: u64,

    /// Duration to wait before attempting to close circuit (seconds)
    #[serde(default = "default_circuit_breaker_wait_secs")]
    pub circuit_breaker_wait_secs: u64,

    #[serde(default = "default_true")]
    pub retry_enabled: bool,

    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: usize,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

impl ResilienceConfig {
    pub fn circuit_breaker_wait_duration(&self) -> Duration {
        Duration::from_secs(self.circuit_breaker_wait_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }
}

/// External mailer collaborator configuration. Spec §1 Non-goals: "email
/// delivery (core only enqueues a send request to an external mailer)" —
/// this struct configures the enqueue target, not a delivery pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailerConfig {
    #[serde(default = "default_mailer_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_mailer_from_address")]
    pub from_address: String,
    /// When true (no `api_key` configured is the usual trigger, but this
    /// flag lets tests force it), sends are logged instead of dispatched.
    #[serde(default)]
    pub sandbox: bool,
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_mailer_endpoint(),
            api_key: None,
            from_address: default_mailer_from_address(),
            sandbox: true,
        }
    }
}

/// Payment gateway collaborator configuration (C11). Spec §8: "mock
/// payment mode gated by the absence of a real secret, not the
/// environment name."
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    #[serde(default)]
    pub api_secret: Option<String>,
    #[serde(default)]
    pub webhook_secret: Option<String>,
    #[serde(default = "default_payment_endpoint")]
    pub endpoint: String,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            api_secret: None,
            webhook_secret: None,
            endpoint: default_payment_endpoint(),
        }
    }
}

impl PaymentConfig {
    /// Spec §8: mock mode is gated on secret presence, never on
    /// `environment`, so staging can still exercise the real path.
    pub fn is_mock_mode(&self) -> bool {
        self.api_secret.is_none()
    }
}

/// Founder pass list: user ids/emails granted lifetime `GUILDMASTER` on
/// signup or login (spec §4.11, §11).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FounderPassConfig {
    #[serde(default)]
    pub user_ids: Vec<String>,
    #[serde(default)]
    pub emails: Vec<String>,
}

impl FounderPassConfig {
    pub fn grants_founder_pass(&self, user_id: &str, email: &str) -> bool {
        self.user_ids.iter().any(|id| id == user_id)
            || self.emails.iter().any(|e| e.eq_ignore_ascii_case(email))
    }
}

/// Signup country validation (spec §4.5, §9: "closed country set").
///
/// Defaults to a small illustrative ISO-3166 alpha-2 subset; deployments
/// override the full list via configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupConfig {
    #[serde(default = "default_allowed_countries")]
    pub allowed_countries: Vec<String>,
    /// Minimum age in years, enforced against `birth_date` (spec §4.5:
    /// "birth date <= today - 1 year").
    #[serde(default = "default_min_age_years")]
    pub min_age_years: u32,
}

impl Default for SignupConfig {
    fn default() -> Self {
        Self {
            allowed_countries: default_allowed_countries(),
            min_age_years: default_min_age_years(),
        }
    }
}

fn default_allowed_countries() -> Vec<String> {
    [
        "US", "CA", "MX", "GB", "IE", "FR", "DE", "ES", "IT", "NL", "SE", "NO", "DK", "FI", "PL",
        "PT", "AU", "NZ", "JP", "KR", "SG", "BR", "AR", "ZA", "IN",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_min_age_years() -> u32 {
    1
}

/// Coefficients for the guild weighted member-activity rate (spec §4.8):
/// `alpha * activeMembers/total + beta * recentActivities/days + gamma *
/// completedGoalsByMembers/total`. Computed on demand, never materialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildAnalyticsConfig {
    #[serde(default = "default_analytics_alpha")]
    pub alpha: f64,
    #[serde(default = "default_analytics_beta")]
    pub beta: f64,
    #[serde(default = "default_analytics_gamma")]
    pub gamma: f64,
    /// Window (in days) the "recent activities" term is normalized against.
    #[serde(default = "default_analytics_window_days")]
    pub window_days: u32,
}

impl Default for GuildAnalyticsConfig {
    fn default() -> Self {
        Self {
            alpha: default_analytics_alpha(),
            beta: default_analytics_beta(),
            gamma: default_analytics_gamma(),
            window_days: default_analytics_window_days(),
        }
    }
}

fn default_analytics_alpha() -> f64 {
    0.5
}

fn default_analytics_beta() -> f64 {
    0.3
}

fn default_analytics_gamma() -> f64 {
    0.2
}

fn default_analytics_window_days() -> u32 {
    7
}

// Default value functions
fn default_service_name() -> String {
    "questforge".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_rest_timeout_secs() -> u64 {
    15
}

fn default_webhook_timeout_secs() -> u64 {
    30
}

fn default_environment() -> String {
    "dev".to_string()
}

fn default_table_name() -> String {
    "questforge-core".to_string()
}

fn default_guild_table_name() -> String {
    "questforge-guilds".to_string()
}

fn default_true() -> bool {
    true
}

fn default_body_limit_mb() -> usize {
    10
}

fn default_cors_mode() -> String {
    "permissive".to_string()
}

fn default_request_id_header() -> String {
    "x-request-id".to_string()
}

fn default_hsts_max_age_secs() -> u64 {
    31_536_000 // 1 year
}

fn default_x_frame_options() -> String {
    "DENY".to_string()
}

fn default_referrer_policy() -> String {
    "strict-origin-when-cross-origin".to_string()
}

fn default_circuit_breaker_threshold() -> f64 {
    0.5
}

fn default_circuit_breaker_min_requests() -> u64 {
    10
}

fn default_circuit_breaker_wait_secs() -> u64 {
    30
}

fn default_retry_max_attempts() -> usize {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

fn default_retry_max_delay_ms() -> u64 {
    10_000
}

fn default_mailer_endpoint() -> String {
    "https://mailer.internal/v1/send".to_string()
}

fn default_mailer_from_address() -> String {
    "no-reply@questforge.app".to_string()
}

fn default_payment_endpoint() -> String {
    "https://payments.internal/v1".to_string()
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Searches for config files in this order (first found is used):
    /// 1. Current working directory: ./config.toml
    /// 2. System directory: /etc/questforge/{service_name}/config.toml
    ///
    /// Environment variables (`QF_` prefix) override all file-based configs.
    pub fn load() -> Result<Self> {
        let service_name = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "questforge".to_string());

        Self::load_for_service(&service_name)
    }

    /// Load configuration for a specific service name.
    pub fn load_for_service(service_name: &str) -> Result<Self> {
        let config_paths = Self::find_config_paths(service_name);

        tracing::debug!("Searching for config files in order:");
        for path in &config_paths {
            tracing::debug!("  - {}", path.display());
        }

        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        for path in config_paths.iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        figment = figment.merge(Env::prefixed("QF_").split("__"));

        let config = figment.extract()?;
        Ok(config)
    }

    /// Load configuration from a specific file. Bypasses the search path,
    /// useful for tests or non-standard deployments.
    pub fn load_from(path: &str) -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("QF_").split("__"))
            .extract()?;

        Ok(config)
    }

    /// Find all possible config file paths for a service, in priority order
    /// (highest first).
    fn find_config_paths(service_name: &str) -> Vec<PathBuf> {
        vec![
            PathBuf::from("config.toml"),
            PathBuf::from("/etc/questforge").join(service_name).join("config.toml"),
        ]
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                name: default_service_name(),
                port: default_port(),
                log_level: default_log_level(),
                timeout_secs: default_rest_timeout_secs(),
                webhook_timeout_secs: default_webhook_timeout_secs(),
                environment: default_environment(),
            },
            auth: AuthConfig::default(),
            store: StoreConfig::default(),
            rate_limit: RateLimitConfig::default(),
            lockout: LockoutConfig::default(),
            cedar: CedarConfig::default(),
            cors: CorsConfig::default(),
            security_headers: SecurityHeadersConfig::default(),
            middleware: MiddlewareConfig::default(),
            mailer: MailerConfig::default(),
            payment: PaymentConfig::default(),
            founder_pass: FounderPassConfig::default(),
            signup: SignupConfig::default(),
            guild_analytics: GuildAnalyticsConfig::default(),
            websocket: WebSocketConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service.port, 8080);
        assert_eq!(config.service.log_level, "info");
        assert_eq!(config.service.timeout_secs, 15);
        assert_eq!(config.service.webhook_timeout_secs, 30);
    }

    #[test]
    fn payment_mock_mode_gated_on_secret_presence_not_environment() {
        let mut config = PaymentConfig::default();
        assert!(config.is_mock_mode());
        config.api_secret = Some("sk_live_x".into());
        assert!(!config.is_mock_mode());
    }

    #[test]
    fn founder_pass_matches_by_id_or_email_case_insensitively() {
        let config = FounderPassConfig {
            user_ids: vec!["user_1".into()],
            emails: vec!["Founder@Example.com".into()],
        };
        assert!(config.grants_founder_pass("user_1", "irrelevant@example.com"));
        assert!(config.grants_founder_pass("someone-else", "founder@example.com"));
        assert!(!config.grants_founder_pass("someone-else", "nobody@example.com"));
    }

    #[test]
    fn config_round_trips_through_figment_defaults() {
        let figment = Figment::new().merge(Serialized::defaults(Config::default()));
        let config: Config = figment.extract().expect("defaults must deserialize back");
        assert_eq!(config.store.table_name, "questforge-core");
    }
}
