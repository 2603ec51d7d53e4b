//! Resend implementation of the NotificationSink port.

use async_trait::async_trait;
use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;

use crate::ports::{Notification, NotificationError, NotificationSink};

use super::templates::compose;

/// Resend API configuration.
#[derive(Clone)]
pub struct ResendConfig {
    pub api_key: SecretString,
    pub api_base_url: String,
    /// Value of the From header, e.g. `Acme Training <noreply@acme.test>`.
    pub from: String,
    pub request_timeout: Duration,
}

impl ResendConfig {
    pub fn new(api_key: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            api_base_url: "https://api.resend.com".to_string(),
            from: from.into(),
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

impl std::fmt::Debug for ResendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResendConfig")
            .field("api_key", &"[REDACTED]")
            .field("api_base_url", &self.api_base_url)
            .field("from", &self.from)
            .finish()
    }
}

/// Sends notifications through the Resend HTTP API.
pub struct ResendNotificationSink {
    config: ResendConfig,
    http_client: reqwest::Client,
}

impl ResendNotificationSink {
    pub fn new(config: ResendConfig) -> Result<Self, NotificationError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| NotificationError::rejected(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    fn payload<'a>(
        &'a self,
        notification: &'a Notification,
    ) -> Result<ResendEmail<'a>, NotificationError> {
        let content = compose(notification)?;
        let attachments = notification
            .attachment
            .iter()
            .map(|a| ResendAttachment {
                filename: &a.filename,
                content: base64::engine::general_purpose::STANDARD.encode(&a.bytes),
                content_type: &a.content_type,
            })
            .collect();

        Ok(ResendEmail {
            from: &self.config.from,
            to: vec![notification.recipient.as_str()],
            subject: content.subject,
            text: content.text,
            attachments,
        })
    }
}

#[derive(Debug, Serialize)]
struct ResendEmail<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: String,
    text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<ResendAttachment<'a>>,
}

#[derive(Debug, Serialize)]
struct ResendAttachment<'a> {
    filename: &'a str,
    content: String,
    content_type: &'a str,
}

/// Maps an HTTP status onto a delivery outcome.
fn classify_status(status: reqwest::StatusCode, body: &str) -> Result<(), NotificationError> {
    if status.is_success() {
        return Ok(());
    }
    let message = format!("Resend returned HTTP {}: {}", status.as_u16(), body);
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::CONFLICT
        || status.is_server_error()
    {
        Err(NotificationError::transient(message))
    } else {
        Err(NotificationError::rejected(message))
    }
}

#[async_trait]
impl NotificationSink for ResendNotificationSink {
    async fn send(
        &self,
        notification: &Notification,
        idempotency_key: &str,
    ) -> Result<(), NotificationError> {
        let payload = self.payload(notification)?;
        let url = format!("{}/emails", self.config.api_base_url);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(self.config.api_key.expose_secret())
            .header("Idempotency-Key", idempotency_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotificationError::transient(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let outcome = classify_status(status, &body);
        if let Err(e) = &outcome {
            tracing::warn!(
                template = %notification.template,
                idempotency_key = %idempotency_key,
                error = %e,
                "Email delivery failed"
            );
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::Attachment;
    use reqwest::StatusCode;
    use serde_json::json;

    fn sink() -> ResendNotificationSink {
        ResendNotificationSink::new(ResendConfig::new(
            "re_test",
            "Acme Training <noreply@acme.test>",
        ))
        .unwrap()
    }

    #[test]
    fn payload_encodes_attachment_as_base64() {
        let sink = sink();
        let notification = Notification::new(
            "ada@example.com",
            "payment_confirmed",
            json!({ "course_title": "Async Rust" }),
        )
        .with_attachment(Attachment {
            filename: "receipt.txt".to_string(),
            content_type: "text/plain".to_string(),
            bytes: b"hello".to_vec(),
        });

        let payload = serde_json::to_value(sink.payload(&notification).unwrap()).unwrap();
        assert_eq!(payload["to"], json!(["ada@example.com"]));
        assert_eq!(payload["from"], "Acme Training <noreply@acme.test>");
        assert_eq!(payload["attachments"][0]["content"], "aGVsbG8=");
        assert_eq!(payload["attachments"][0]["filename"], "receipt.txt");
    }

    #[test]
    fn payload_omits_empty_attachments() {
        let sink = sink();
        let notification =
            Notification::new("ada@example.com", "registration_cancelled", json!({}));
        let payload = serde_json::to_value(sink.payload(&notification).unwrap()).unwrap();
        assert!(payload.get("attachments").is_none());
    }

    #[test]
    fn throttling_and_outages_are_transient() {
        assert!(classify_status(StatusCode::OK, "").is_ok());
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "")
            .unwrap_err()
            .is_retryable());
        assert!(classify_status(StatusCode::BAD_GATEWAY, "")
            .unwrap_err()
            .is_retryable());
        assert!(!classify_status(StatusCode::UNPROCESSABLE_ENTITY, "bad address")
            .unwrap_err()
            .is_retryable());
    }
}
