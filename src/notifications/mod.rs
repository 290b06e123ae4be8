//! Notifications about newly created repositories.
//!
//! When enabled, every `repository.created` delivery is forwarded to an HTTP
//! endpoint as `{"subject": ..., "message": ...}` where `message` is the raw
//! `repository` object of the delivery.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::NotificationConfig;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, subject: &str, message: &str) -> Result<()>;
}

/// Build the notifier selected by the configuration.
pub fn from_config(config: &NotificationConfig, timeout: Duration) -> Result<Arc<dyn Notifier>> {
    if !config.enabled {
        return Ok(Arc::new(DisabledNotifier));
    }

    let url = config
        .url
        .as_deref()
        .context("notifications.url is required when notifications are enabled")?;
    Ok(Arc::new(WebhookNotifier::new(url, timeout)?))
}

#[derive(Debug, Serialize)]
struct NotificationBody<'a> {
    subject: &'a str,
    message: &'a str,
}

/// Posts notifications as JSON to a fixed URL.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    http_client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build notification HTTP client")?;

        Ok(Self {
            http_client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn publish(&self, subject: &str, message: &str) -> Result<()> {
        self.http_client
            .post(&self.url)
            .json(&NotificationBody { subject, message })
            .send()
            .await
            .context("Failed to send notification")?
            .error_for_status()?;

        tracing::info!("Published notification to {}", self.url);
        Ok(())
    }
}

/// Drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn publish(&self, subject: &str, _message: &str) -> Result<()> {
        tracing::debug!(subject, "Notifications disabled, skipping");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_webhook_notifier_posts_subject_and_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/notify"))
            .and(body_json(serde_json::json!({
                "subject": "GitHub Webhook Handler message",
                "message": "{\"id\":42}"
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let notifier =
            WebhookNotifier::new(&format!("{}/notify", server.uri()), Duration::from_secs(2))
                .unwrap();
        notifier
            .publish("GitHub Webhook Handler message", "{\"id\":42}")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_webhook_notifier_reports_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(&server.uri(), Duration::from_secs(2)).unwrap();
        assert!(notifier.publish("s", "m").await.is_err());
    }

    #[tokio::test]
    async fn test_disabled_notifier_is_noop() {
        let notifier = from_config(&NotificationConfig::default(), Duration::from_secs(1)).unwrap();
        notifier.publish("s", "m").await.unwrap();
    }

    #[test]
    fn test_enabled_without_url_is_rejected() {
        let config = NotificationConfig {
            enabled: true,
            ..NotificationConfig::default()
        };
        assert!(from_config(&config, Duration::from_secs(1)).is_err());
    }
}
