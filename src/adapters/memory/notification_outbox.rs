//! In-memory NotificationOutbox.

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, RegistrationId, Timestamp};
use crate::ports::{EnqueueResult, NotificationOutbox, NotificationOutboxEntry, NotificationStatus};

/// In-memory outbox for tests and single-node development.
#[derive(Default)]
pub struct InMemoryNotificationOutbox {
    entries: RwLock<Vec<NotificationOutboxEntry>>,
}

impl InMemoryNotificationOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    // === Test Helpers ===

    /// Snapshot of every entry, oldest first.
    pub async fn all(&self) -> Vec<NotificationOutboxEntry> {
        self.entries.read().await.clone()
    }

    /// Number of entries with the given status.
    pub async fn count_with_status(&self, status: NotificationStatus) -> usize {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.status == status)
            .count()
    }

    async fn modify<F>(&self, id: Uuid, f: F) -> Result<(), DomainError>
    where
        F: FnOnce(&mut NotificationOutboxEntry) + Send,
    {
        let mut entries = self.entries.write().await;
        let entry = entries.iter_mut().find(|e| e.id == id).ok_or_else(|| {
            DomainError::new(
                ErrorCode::InternalError,
                format!("Notification {} not found", id),
            )
        })?;
        f(entry);
        Ok(())
    }
}

#[async_trait]
impl NotificationOutbox for InMemoryNotificationOutbox {
    async fn enqueue(&self, entry: &NotificationOutboxEntry) -> Result<EnqueueResult, DomainError> {
        let mut entries = self.entries.write().await;
        let duplicate = entries
            .iter()
            .any(|e| e.registration_id == entry.registration_id && e.marker == entry.marker);
        if duplicate {
            return Ok(EnqueueResult::Duplicate);
        }
        entries.push(entry.clone());
        Ok(EnqueueResult::Inserted)
    }

    async fn claim_due(
        &self,
        now: Timestamp,
        lease_secs: u64,
        limit: u32,
    ) -> Result<Vec<NotificationOutboxEntry>, DomainError> {
        let mut entries = self.entries.write().await;
        let lease_until = now.plus_secs(lease_secs);
        let mut claimed = Vec::new();

        for entry in entries.iter_mut() {
            if claimed.len() >= limit as usize {
                break;
            }
            if entry.status == NotificationStatus::Pending && !entry.next_attempt_at.is_after(&now)
            {
                entry.next_attempt_at = lease_until;
                claimed.push(entry.clone());
            }
        }
        Ok(claimed)
    }

    async fn mark_delivered(
        &self,
        id: Uuid,
        attempts: u32,
        at: Timestamp,
    ) -> Result<(), DomainError> {
        self.modify(id, |e| {
            e.status = NotificationStatus::Delivered;
            e.attempts = attempts;
            e.delivered_at = Some(at);
            e.last_error = None;
        })
        .await
    }

    async fn schedule_retry(
        &self,
        id: Uuid,
        attempts: u32,
        next_attempt_at: Timestamp,
        error: &str,
    ) -> Result<(), DomainError> {
        let error = error.to_string();
        self.modify(id, move |e| {
            if e.status == NotificationStatus::Pending {
                e.attempts = attempts;
                e.next_attempt_at = next_attempt_at;
                e.last_error = Some(error);
            }
        })
        .await
    }

    async fn mark_dead(&self, id: Uuid, attempts: u32, error: &str) -> Result<(), DomainError> {
        let error = error.to_string();
        self.modify(id, move |e| {
            e.status = NotificationStatus::Dead;
            e.attempts = attempts;
            e.last_error = Some(error);
        })
        .await
    }

    async fn find_by_registration(
        &self,
        registration_id: RegistrationId,
    ) -> Result<Vec<NotificationOutboxEntry>, DomainError> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .filter(|e| e.registration_id == registration_id)
            .cloned()
            .collect())
    }
}
