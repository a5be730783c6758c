//! Liveness and readiness handlers.
//!
//! Spec §10: kept even though the functional spec's Non-goals exclude
//! "dashboards" — `/health`/`/ready` are ambient infrastructure, not a UI.
//! Generalized from the teacher's per-driver (Postgres/Redis/NATS) checks
//! to a collaborator-agnostic [`ReadinessProbe`] trait, since this
//! service's external dependencies are the store (C1), the identity
//! provider's JWKS endpoint (C3), the mailer, and the payment gateway
//! rather than a SQL/cache/event-bus stack.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single external collaborator this service depends on for readiness
/// (the store, the JWKS endpoint, the mailer, the payment gateway).
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    /// Name reported under `dependencies` in the readiness response.
    fn name(&self) -> &str;

    /// `Ok(())` if the collaborator is reachable; `Err(message)` otherwise.
    async fn check(&self) -> Result<(), String>;
}

/// Shared readiness state: the service identity plus the collaborators to
/// probe. Constructed once at startup by `app`'s binary entry point and
/// shared via axum `State`.
#[derive(Clone)]
pub struct HealthState {
    pub service_name: String,
    pub probes: Vec<Arc<dyn ReadinessProbe>>,
}

impl HealthState {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            probes: Vec::new(),
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn ReadinessProbe>) -> Self {
        self.probes.push(probe);
        self
    }
}

/// Health check response (liveness)
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Readiness check response with dependency status
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub service: String,
    pub dependencies: HashMap<String, DependencyStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DependencyStatus {
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Liveness probe: always 200 while the process is running. Used by an
/// orchestrator to decide whether to restart the pod.
pub async fn health(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        service: state.service_name.clone(),
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
    };

    (StatusCode::OK, Json(response))
}

/// Readiness probe: runs every registered [`ReadinessProbe`] concurrently
/// and reports 503 if any collaborator is unreachable. Used by an
/// orchestrator to decide whether to route traffic to the pod.
pub async fn readiness(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let results = futures::future::join_all(
        state
            .probes
            .iter()
            .map(|probe| async move { (probe.name().to_string(), probe.check().await) }),
    )
    .await;

    let mut dependencies = HashMap::with_capacity(results.len());
    let mut all_ready = true;

    for (name, result) in results {
        let status = match result {
            Ok(()) => DependencyStatus {
                healthy: true,
                message: None,
            },
            Err(message) => {
                all_ready = false;
                DependencyStatus {
                    healthy: false,
                    message: Some(message),
                }
            }
        };
        dependencies.insert(name, status);
    }

    let response = ReadinessResponse {
        ready: all_ready,
        service: state.service_name.clone(),
        dependencies,
    };

    let status_code = if all_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysHealthy;

    #[async_trait]
    impl ReadinessProbe for AlwaysHealthy {
        fn name(&self) -> &str {
            "store"
        }
        async fn check(&self) -> Result<(), String> {
            Ok(())
        }
    }

    struct AlwaysDown;

    #[async_trait]
    impl ReadinessProbe for AlwaysDown {
        fn name(&self) -> &str {
            "mailer"
        }
        async fn check(&self) -> Result<(), String> {
            Err("connection refused".to_string())
        }
    }

    #[tokio::test]
    async fn ready_when_all_probes_pass() {
        let state = Arc::new(HealthState::new("questforge").with_probe(Arc::new(AlwaysHealthy)));
        let response = readiness(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn not_ready_when_any_probe_fails() {
        let state = Arc::new(
            HealthState::new("questforge")
                .with_probe(Arc::new(AlwaysHealthy))
                .with_probe(Arc::new(AlwaysDown)),
        );
        let response = readiness(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
