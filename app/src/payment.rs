//! Payment gateway collaborator (C11). `PaymentGateway` is the seam the
//! subscription service checks out against; `MockGateway` is what
//! `PaymentConfig::is_mock_mode` (spec §8: gated on secret absence, never
//! on environment) selects whenever no live secret is configured.

use async_trait::async_trait;
use serde::Serialize;

use questforge_core::config::PaymentConfig;
use questforge_core::error::{Error, Result};

#[derive(Serialize)]
pub struct CheckoutSession {
    pub session_id: String,
    pub checkout_url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(&self, user_id: &str, tier: &str) -> Result<CheckoutSession>;
}

pub struct MockGateway {
    endpoint: String,
}

impl MockGateway {
    pub fn new(config: &PaymentConfig) -> Self {
        Self { endpoint: config.endpoint.clone() }
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_checkout_session(&self, user_id: &str, tier: &str) -> Result<CheckoutSession> {
        let session_id = format!("mock_cs_{user_id}_{tier}");
        Ok(CheckoutSession {
            checkout_url: format!("{}/mock-checkout/{session_id}", self.endpoint),
            session_id,
        })
    }
}

pub struct HttpGateway {
    config: PaymentConfig,
    http: reqwest::Client,
}

impl HttpGateway {
    pub fn new(config: PaymentConfig) -> Self {
        Self { config, http: reqwest::Client::new() }
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn create_checkout_session(&self, user_id: &str, tier: &str) -> Result<CheckoutSession> {
        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.config.endpoint))
            .bearer_auth(self.config.api_secret.as_deref().unwrap_or_default())
            .json(&serde_json::json!({ "user_id": user_id, "tier": tier }))
            .send()
            .await
            .map_err(|e| Error::Dependency(format!("payment gateway unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Dependency(format!("payment gateway rejected checkout: {}", response.status())));
        }
        #[derive(serde::Deserialize)]
        struct Body {
            session_id: String,
            checkout_url: String,
        }
        let body: Body = response
            .json()
            .await
            .map_err(|e| Error::Dependency(format!("malformed checkout response: {e}")))?;
        Ok(CheckoutSession { session_id: body.session_id, checkout_url: body.checkout_url })
    }
}

/// Picks `HttpGateway` or `MockGateway` per `PaymentConfig::is_mock_mode`.
pub fn build_gateway(config: PaymentConfig) -> Box<dyn PaymentGateway> {
    if config.is_mock_mode() {
        Box::new(MockGateway::new(&config))
    } else {
        Box::new(HttpGateway::new(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_mode_is_selected_without_a_secret() {
        let gateway = build_gateway(PaymentConfig::default());
        let session = gateway.create_checkout_session("user-1", "SAGE").await.unwrap();
        assert!(session.session_id.starts_with("mock_cs_"));
    }
}
