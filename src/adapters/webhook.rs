//! Webhook Sink Adapter
//!
//! Implements the `ReportSink` port by POSTing the payload as JSON.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::{debug, instrument};

use crate::config::WebhookSettings;
use crate::domain::ReportSink;
use crate::error::{Error, Result};
use crate::report::WebhookPayload;

/// Upper bound on establishing the connection
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP webhook destination.
///
/// The URL usually embeds a secret token, so only its host is ever logged.
pub struct WebhookSink {
    client: Client,
    url: Url,
}

impl WebhookSink {
    /// Create a sink from validated settings
    pub fn new(settings: &WebhookSettings) -> Result<Self> {
        Self::with_url(&settings.url, &settings.sender_name, settings.request_timeout)
    }

    /// Create a sink for `url`
    pub fn with_url(url: &str, sender_name: &str, request_timeout: Duration) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| Error::Config(format!("Invalid webhook URL: {}", e)))?;

        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(request_timeout)
            .user_agent(format!("{}-Webhook", sender_name))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, url })
    }

    fn host(&self) -> &str {
        self.url.host_str().unwrap_or("unknown host")
    }
}

impl std::fmt::Debug for WebhookSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookSink")
            .field("host", &self.host())
            .finish()
    }
}

#[async_trait]
impl ReportSink for WebhookSink {
    #[instrument(skip(self, payload), fields(host = %self.host()))]
    async fn send(&self, payload: &WebhookPayload) -> Result<()> {
        let response = self
            .client
            .post(self.url.clone())
            .json(payload)
            .send()
            .await
            .map_err(|e| Error::DeliveryTransport(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::DeliveryStatus {
                status: status.as_u16(),
            });
        }

        debug!("Webhook accepted payload with status {}", status);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("webhook at {}", self.host())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_describe_hides_token() {
        let sink = WebhookSink::with_url(
            "https://discord.com/api/webhooks/123/secret-token",
            "ServerUtils",
            Duration::from_secs(30),
        )
        .unwrap();

        assert_eq!(sink.describe(), "webhook at discord.com");
        assert!(!format!("{:?}", sink).contains("secret-token"));
    }

    #[test]
    fn test_invalid_url() {
        assert_matches!(
            WebhookSink::with_url("not a url", "ServerUtils", Duration::from_secs(1)),
            Err(Error::Config(_))
        );
    }

    #[test]
    fn test_from_settings() {
        let settings = crate::config::MonitorConfig {
            enable_send_webhook: true,
            webhook_url: "https://discordapp.com/api/webhooks/1/x".to_string(),
            ..Default::default()
        }
        .validate()
        .webhook();

        let sink = WebhookSink::new(&settings).unwrap();
        assert_eq!(sink.describe(), "webhook at discordapp.com");
    }
}
