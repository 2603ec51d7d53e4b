//! Recording notification sink for tests and local runs.
//!
//! Keeps every accepted message in memory. Failures can be scripted to
//! exercise the relay's retry and dead-letter paths.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::ports::{Notification, NotificationError, NotificationSink};

/// A delivered message and the key it was sent with.
#[derive(Debug, Clone, PartialEq)]
pub struct SentNotification {
    pub idempotency_key: String,
    pub notification: Notification,
}

#[derive(Default)]
struct RecordingState {
    sent: Vec<SentNotification>,
    failures: VecDeque<NotificationError>,
    attempts: usize,
}

/// In-memory sink.
#[derive(Clone, Default)]
pub struct RecordingNotificationSink {
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `send` fails with `error` instead of recording.
    pub async fn fail_next(&self, error: NotificationError) {
        self.state.lock().await.failures.push_back(error);
    }

    /// Messages accepted so far, in order.
    pub async fn sent(&self) -> Vec<SentNotification> {
        self.state.lock().await.sent.clone()
    }

    /// Accepted messages using the given template.
    pub async fn sent_with_template(&self, template: &str) -> Vec<SentNotification> {
        self.sent()
            .await
            .into_iter()
            .filter(|s| s.notification.template == template)
            .collect()
    }

    /// Calls to `send`, failed or not.
    pub async fn attempts(&self) -> usize {
        self.state.lock().await.attempts
    }
}

#[async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn send(
        &self,
        notification: &Notification,
        idempotency_key: &str,
    ) -> Result<(), NotificationError> {
        let mut state = self.state.lock().await;
        state.attempts += 1;
        if let Some(error) = state.failures.pop_front() {
            return Err(error);
        }

        tracing::debug!(
            recipient = %notification.recipient,
            template = %notification.template,
            "Recorded notification"
        );
        state.sent.push(SentNotification {
            idempotency_key: idempotency_key.to_string(),
            notification: notification.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn scripted_failure_then_success() {
        let sink = RecordingNotificationSink::new();
        sink.fail_next(NotificationError::transient("503")).await;

        let n = Notification::new("ada@example.com", "quote_issued", json!({}));
        assert!(sink.send(&n, "k1").await.is_err());
        assert!(sink.send(&n, "k1").await.is_ok());

        assert_eq!(sink.attempts().await, 2);
        assert_eq!(sink.sent_with_template("quote_issued").await.len(), 1);
        assert_eq!(sink.sent().await[0].idempotency_key, "k1");
    }
}
