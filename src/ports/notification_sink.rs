//! Notification sink port for transactional email delivery.
//!
//! The sink is fire-and-confirm: it either accepts a message or reports an
//! error classified as transient (retry later) or permanent (never retry).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::billing::RenderedDocument;

/// A file attached to a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl From<RenderedDocument> for Attachment {
    fn from(doc: RenderedDocument) -> Self {
        Self {
            filename: doc.filename,
            content_type: doc.content_type,
            bytes: doc.bytes,
        }
    }
}

/// A templated message addressed to one learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Recipient email address.
    pub recipient: String,

    /// Template name, e.g. `payment_confirmed`.
    pub template: String,

    /// Values substituted into the template.
    pub data: serde_json::Value,

    /// Optional document attached to the message.
    pub attachment: Option<Attachment>,
}

impl Notification {
    pub fn new(
        recipient: impl Into<String>,
        template: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            template: template.into(),
            data,
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }
}

/// Errors from notification delivery.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationError {
    /// The provider could not be reached or asked us to back off.
    #[error("Notification delivery failed transiently: {0}")]
    Transient(String),

    /// The provider refused the message; retrying will not help.
    #[error("Notification rejected: {0}")]
    Rejected(String),
}

impl NotificationError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, NotificationError::Transient(_))
    }
}

/// Port for delivering notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one message.
    ///
    /// `idempotency_key` is stable across redeliveries of the same message.
    async fn send(
        &self,
        notification: &Notification,
        idempotency_key: &str,
    ) -> Result<(), NotificationError>;
}
