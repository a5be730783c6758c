//! Middleware stack: authorization (C3), rate limiting (C4), Cedar
//! route-policy evaluation, plus the generic request-tracking and
//! security-header layers.

pub mod authz;
pub mod cedar;
pub mod rate_limit;
pub mod request_tracking;
pub mod security_headers;

pub use authz::{authz_layer, AuthzError};
pub use cedar::{CedarAuthz, CedarConfig};
pub use rate_limit::{rate_limit_layer, Quota, RateLimitConfig, RateLimiter, Scope};
pub use request_tracking::{
    request_id_layer, request_id_propagation_layer, sensitive_headers_layer,
    RequestTrackingConfig, PROPAGATE_HEADERS, SENSITIVE_HEADERS,
};
pub use security_headers::apply_security_headers;
