//! SendGrid email channel
//!
//! Sends notifications through the SendGrid v3 `mail/send` endpoint.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::{Channel, ChannelError, ChannelResult, DeliveryStatus};
use crate::config::EmailConfig;
use crate::notifications::Notification;

/// SendGrid notification channel
///
/// # Payload Format
///
/// ```json
/// {
///   "personalizations": [{ "to": [{ "email": "team@example.com" }] }],
///   "from": { "email": "bot@example.com" },
///   "subject": "Notion Task Status Updated",
///   "content": [{ "type": "text/plain", "value": "A Notion task's: ..." }]
/// }
/// ```
pub struct SendGridChannel {
    client: Client,
    api_key: String,
    send_url: String,
}

impl SendGridChannel {
    /// Create a new SendGrid channel
    pub fn new(config: &EmailConfig, timeout: Duration) -> ChannelResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ChannelError::InvalidConfig(
                "SendGrid API key cannot be empty".to_string(),
            ));
        }

        let base = config.api_url.trim_end_matches('/');
        if !base.starts_with("http://") && !base.starts_with("https://") {
            return Err(ChannelError::InvalidConfig(
                "SendGrid URL must start with http:// or https://".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChannelError::InvalidConfig(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            send_url: format!("{base}/v3/mail/send"),
        })
    }

    /// Get the send endpoint
    pub fn url(&self) -> &str {
        &self.send_url
    }

    /// Build the SendGrid payload for a notification
    fn build_payload(notification: &Notification) -> serde_json::Value {
        serde_json::json!({
            "personalizations": [
                { "to": [{ "email": notification.to }] }
            ],
            "from": { "email": notification.from },
            "subject": notification.subject,
            "content": [
                { "type": "text/plain", "value": notification.body }
            ],
        })
    }
}

#[async_trait]
impl Channel for SendGridChannel {
    fn name(&self) -> &str {
        "sendgrid"
    }

    async fn send(&self, notification: &Notification) -> ChannelResult<DeliveryStatus> {
        let payload = Self::build_payload(notification);

        let response = self
            .client
            .post(&self.send_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            return Err(ChannelError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(DeliveryStatus::success_with_message(
            self.name(),
            format!("Accepted for {} (status: {status})", notification.to),
        ))
    }
}
