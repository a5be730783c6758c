//! Cedar policy-based route authorization.
//!
//! Spec §4.3 step 5: "produce an allow policy listing the set of route
//! patterns the principal may invoke, plus a principal context dictionary
//! propagated downstream." This middleware is that step — it runs after
//! [`crate::middleware::authz_layer`] has inserted a validated [`Principal`]
//! into the request, and evaluates the configured Cedar policy set against
//! `(principal, action = "METHOD /route/pattern", resource)`.

use axum::{
    body::Body,
    extract::{MatchedPath, Request, State},
    http::{HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use cedar_policy::{
    Authorizer, Context, Decision, Entities, EntityUid, PolicySet, Request as CedarRequest,
};
use chrono::{Datelike, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::auth::Principal;
use crate::error::Error;

/// Configuration for the Cedar route-authorization layer. Folded into the
/// top-level service config (spec §10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CedarConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub policy_path: PathBuf,
    /// Whether a `Deny` decision degrades to "allow" rather than `403` —
    /// only ever useful while bootstrapping a fresh policy set.
    #[serde(default)]
    pub fail_open: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CedarConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            policy_path: PathBuf::from("policies/cedar.policies"),
            fail_open: false,
        }
    }
}

/// Cedar authorization middleware state.
#[derive(Clone)]
pub struct CedarAuthz {
    authorizer: Arc<Authorizer>,
    policy_set: Arc<RwLock<PolicySet>>,
    config: Arc<CedarConfig>,
    path_normalizer: Option<fn(&str) -> String>,
}

impl CedarAuthz {
    pub async fn new(config: CedarConfig) -> Result<Self, Error> {
        let path = config.policy_path.clone();
        let policies = tokio::task::spawn_blocking(move || std::fs::read_to_string(&path))
            .await
            .map_err(|e| Error::Internal(format!("task join error: {e}")))?
            .map_err(|e| {
                Error::Config(Box::new(figment::Error::from(format!(
                    "failed to read Cedar policy file from '{}': {e}",
                    config.policy_path.display()
                ))))
            })?;

        let policy_set: PolicySet = policies
            .parse()
            .map_err(|e| Error::Config(Box::new(figment::Error::from(format!("failed to parse Cedar policies: {e}")))))?;

        Ok(Self {
            authorizer: Arc::new(Authorizer::new()),
            policy_set: Arc::new(RwLock::new(policy_set)),
            config: Arc::new(config),
            path_normalizer: None,
        })
    }

    /// By default paths are normalized by replacing UUID/numeric segments
    /// with `{id}` before becoming part of a Cedar action name; a consumer
    /// with its own id shape (e.g. the TypeID-prefixed entity ids used
    /// throughout this service) can override with a tighter normalizer.
    pub fn with_path_normalizer(mut self, normalizer: fn(&str) -> String) -> Self {
        self.path_normalizer = Some(normalizer);
        self
    }

    pub async fn middleware(
        State(authz): State<Self>,
        request: Request<Body>,
        next: Next,
    ) -> Result<Response, Error> {
        if !authz.config.enabled {
            return Ok(next.run(request).await);
        }

        let path = request.uri().path();
        if path == "/health" || path == "/ready" {
            return Ok(next.run(request).await);
        }

        let principal_ctx = request
            .extensions()
            .get::<Principal>()
            .ok_or_else(|| {
                Error::Forbidden(
                    "missing principal; authz_layer must run before cedar middleware".into(),
                )
            })?
            .clone();

        let method = request.method().clone();

        let principal = build_principal(&principal_ctx)?;
        let action = build_action_http(&method, &request, authz.path_normalizer)?;
        let context = build_context_http(request.headers(), &principal_ctx)?;
        let resource = build_resource()?;

        let cedar_request = CedarRequest::new(
            principal.clone(),
            action.clone(),
            resource.clone(),
            context,
            None,
        )
        .map_err(|e| Error::Internal(format!("failed to build Cedar request: {e}")))?;

        let policy_set = authz.policy_set.read().await;
        let entities = build_entities(&principal_ctx)?;

        let response = authz.authorizer.is_authorized(&cedar_request, &policy_set, &entities);

        match response.decision() {
            Decision::Allow => Ok(next.run(request).await),
            Decision::Deny => {
                tracing::warn!(principal = ?principal, action = ?action, "Cedar policy denied request");
                if authz.config.fail_open {
                    tracing::warn!("Cedar policy denied but fail_open=true, allowing request");
                    Ok(next.run(request).await)
                } else {
                    Err(Error::Forbidden("access denied by policy".to_string()))
                }
            }
        }
    }

    /// Hot-reload the policy set from disk without restarting the service.
    pub async fn reload_policies(&self) -> Result<(), Error> {
        let path = self.config.policy_path.clone();
        let policies = tokio::task::spawn_blocking(move || std::fs::read_to_string(&path))
            .await
            .map_err(|e| Error::Internal(format!("task join error: {e}")))?
            .map_err(|e| Error::Internal(format!("failed to read policy file: {e}")))?;

        let new_policy_set: PolicySet = policies
            .parse()
            .map_err(|e| Error::Internal(format!("failed to parse policies: {e}")))?;

        let mut policy_set = self.policy_set.write().await;
        *policy_set = new_policy_set;

        tracing::info!("Cedar policies reloaded from {}", self.config.policy_path.display());
        Ok(())
    }
}

/// Generic default resource — nearly every policy in this system checks
/// only principal + action (e.g. "can a `member` call `POST /guilds`"),
/// not resource-scoped attributes. Ownership/membership checks are
/// enforced in the domain services themselves (spec §7 "isolation returns
/// 403, never 404").
fn build_resource() -> Result<EntityUid, Error> {
    r#"Resource::"default""#
        .parse()
        .map_err(|e| Error::Internal(format!("failed to parse resource: {e}")))
}

fn build_principal(principal: &Principal) -> Result<EntityUid, Error> {
    let kind = if principal.is_local() { "User" } else { "ExternalUser" };
    format!(r#"{kind}::"{}""#, principal.sub)
        .parse()
        .map_err(|e| Error::Internal(format!("invalid principal: {e}")))
}

fn build_action_http(
    method: &Method,
    request: &Request<Body>,
    path_normalizer: Option<fn(&str) -> String>,
) -> Result<EntityUid, Error> {
    let normalized_path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| match path_normalizer {
            Some(normalizer) => normalizer(request.uri().path()),
            None => normalize_path_generic(request.uri().path()),
        });

    let action_str = format!(r#"Action::"{method} {normalized_path}""#);

    action_str
        .parse()
        .map_err(|e| Error::Internal(format!("invalid action: {e}")))
}

/// Fallback path normalizer for when Axum's `MatchedPath` isn't available
/// (e.g. evaluated outside the router). Replaces UUIDs and the TypeID
/// entity ids this service uses (`goal_01h...`, `quest_01h...`, ...) with
/// `{id}`.
fn normalize_path_generic(path: &str) -> String {
    let uuid_pattern =
        regex::Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}").unwrap();
    let path = uuid_pattern.replace_all(path, "{id}");

    let type_id_pattern = regex::Regex::new(r"/[a-z]+_[0-9a-z]{26}(?:/|$)").unwrap();
    let path = type_id_pattern.replace_all(&path, "/{id}/");

    let numeric_pattern = regex::Regex::new(r"/(\d+)(?:/|$)").unwrap();
    let path = numeric_pattern.replace_all(&path, "/{id}/");

    path.trim_end_matches('/').to_string()
}

fn build_context_http(headers: &HeaderMap, principal: &Principal) -> Result<Context, Error> {
    let mut context_map = serde_json::Map::new();

    context_map.insert("provider".to_string(), json!(principal.provider));
    if let Some(role) = &principal.role {
        context_map.insert("role".to_string(), json!(role));
    }
    if let Some(email) = &principal.email {
        context_map.insert("email".to_string(), json!(email));
    }

    let now = chrono::Utc::now();
    context_map.insert(
        "timestamp".to_string(),
        json!({
            "unix": now.timestamp(),
            "hour": now.hour(),
            "dayOfWeek": now.weekday().to_string(),
        }),
    );

    if let Some(ip) = extract_client_ip(headers) {
        context_map.insert("ip".to_string(), json!(ip));
    }
    if let Some(request_id) = headers.get("x-request-id").and_then(|v| v.to_str().ok()) {
        context_map.insert("requestId".to_string(), json!(request_id));
    }

    Context::from_json_value(serde_json::Value::Object(context_map), None)
        .map_err(|e| Error::Internal(format!("failed to build context: {e}")))
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

/// Builds the principal entity (with role/provider attributes) Cedar
/// policies can match on, e.g. `when { principal.role == "admin" }`.
fn build_entities(principal: &Principal) -> Result<Entities, Error> {
    use serde_json::Value;

    let kind = if principal.is_local() { "User" } else { "ExternalUser" };
    let entity = json!({
        "uid": { "type": kind, "id": principal.sub },
        "attrs": {
            "provider": principal.provider,
            "role": principal.role.clone().unwrap_or_default(),
            "email": principal.email.clone().unwrap_or_default(),
        },
        "parents": []
    });

    Entities::from_json_value(Value::Array(vec![entity]), None)
        .map_err(|e| Error::Internal(format!("failed to build entities: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_entity_ids_and_uuids() {
        assert_eq!(normalize_path_generic("/goals/goal_01h455vb4pex5vsknk084sn02q"), "/goals/{id}");
        assert_eq!(
            normalize_path_generic("/users/3fa85f64-5717-4562-b3fc-2c963f66afa6/goals"),
            "/users/{id}/goals"
        );
    }

    #[test]
    fn builds_user_principal_entity_uid() {
        let principal = Principal {
            sub: "user-1".into(),
            provider: "local".into(),
            email: None,
            role: Some("member".into()),
            nickname: None,
        };
        let uid = build_principal(&principal).unwrap();
        assert_eq!(uid.to_string(), r#"User::"user-1""#);
    }
}
