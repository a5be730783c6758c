//! Mailer collaborator (spec §1 Non-goals: "email delivery — core only
//! enqueues a send request to an external mailer"). `Mailer` is the seam;
//! `HttpMailer` posts to the configured endpoint the way `JwksCache` in
//! `questforge_core::auth::jwks` round-trips to an external HTTP service,
//! `SandboxMailer` just logs (spec §8: sandbox mode when no `api_key` is
//! configured).

use async_trait::async_trait;
use questforge_core::error::{Error, Result};
use questforge_core::config::MailerConfig;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

pub struct HttpMailer {
    config: MailerConfig,
    http: reqwest::Client,
}

impl HttpMailer {
    pub fn new(config: MailerConfig) -> Self {
        Self { config, http: reqwest::Client::new() }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(self.config.api_key.as_deref().unwrap_or_default())
            .json(&serde_json::json!({
                "from": self.config.from_address,
                "to": to,
                "subject": subject,
                "body": body,
            }))
            .send()
            .await
            .map_err(|e| Error::Dependency(format!("mailer unreachable: {e}")))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::Dependency(format!("mailer rejected send: {}", response.status())))
        }
    }
}

pub struct SandboxMailer;

#[async_trait]
impl Mailer for SandboxMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        tracing::info!(to, subject, body, "sandbox mailer: would have sent");
        Ok(())
    }
}

/// Picks `HttpMailer` or `SandboxMailer` per `MailerConfig::sandbox` — the
/// same absence-of-secret gate `PaymentConfig::is_mock_mode` uses.
pub fn build_mailer(config: MailerConfig) -> Box<dyn Mailer> {
    if config.sandbox || config.api_key.is_none() {
        Box::new(SandboxMailer)
    } else {
        Box::new(HttpMailer::new(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sandbox_mailer_never_fails() {
        let mailer = SandboxMailer;
        mailer.send("user@example.com", "Welcome", "hi").await.unwrap();
    }

    #[tokio::test]
    async fn default_config_selects_sandbox() {
        let mailer = build_mailer(MailerConfig::default());
        mailer.send("user@example.com", "Welcome", "hi").await.unwrap();
    }
}
