//! In-memory RegistrationRepository and QuoteSequence.
//!
//! The repository writes its outbox entries while still holding its own
//! write lock, which gives the same all-or-nothing visibility as the
//! PostgreSQL transaction.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::domain::foundation::{DomainError, ErrorCode, RegistrationId, Timestamp};
use crate::domain::registration::Registration;
use crate::ports::{
    NotificationOutbox, NotificationOutboxEntry, QuoteSequence, RegistrationRepository,
};

use super::InMemoryNotificationOutbox;

/// In-memory registration repository for tests and single-node development.
pub struct InMemoryRegistrationRepository {
    registrations: RwLock<HashMap<RegistrationId, Registration>>,
    outbox: Arc<InMemoryNotificationOutbox>,
}

impl InMemoryRegistrationRepository {
    /// Creates a repository that queues notifications into `outbox`.
    pub fn new(outbox: Arc<InMemoryNotificationOutbox>) -> Self {
        Self {
            registrations: RwLock::new(HashMap::new()),
            outbox,
        }
    }

    // === Test Helpers ===

    /// Every stored registration.
    pub async fn all(&self) -> Vec<Registration> {
        self.registrations.read().await.values().cloned().collect()
    }

    /// Overwrites `updated_at` to simulate an idle registration.
    pub async fn backdate(&self, id: RegistrationId, updated_at: Timestamp) {
        if let Some(existing) = self.registrations.write().await.get_mut(&id) {
            let mut record = existing.to_record();
            record.updated_at = updated_at;
            *existing = Registration::reconstitute(record);
        }
    }
}

#[async_trait]
impl RegistrationRepository for InMemoryRegistrationRepository {
    async fn insert(&self, registration: &Registration) -> Result<(), DomainError> {
        let mut registrations = self.registrations.write().await;
        if registrations.contains_key(&registration.id()) {
            return Err(DomainError::new(
                ErrorCode::DatabaseError,
                format!("Registration {} already exists", registration.id()),
            ));
        }
        registrations.insert(registration.id(), registration.clone());
        Ok(())
    }

    async fn update(
        &self,
        registration: &Registration,
        expected_version: u64,
        notification: Option<&NotificationOutboxEntry>,
    ) -> Result<(), DomainError> {
        let mut registrations = self.registrations.write().await;
        let stored = registrations.get(&registration.id()).ok_or_else(|| {
            DomainError::new(
                ErrorCode::RegistrationNotFound,
                format!("Registration not found: {}", registration.id()),
            )
        })?;

        if stored.version() != expected_version {
            return Err(DomainError::new(
                ErrorCode::ConcurrentModification,
                format!(
                    "Registration {} is at version {}, expected {}",
                    registration.id(),
                    stored.version(),
                    expected_version
                ),
            ));
        }

        if let Some(entry) = notification {
            self.outbox.enqueue(entry).await?;
        }
        registrations.insert(registration.id(), registration.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: RegistrationId) -> Result<Option<Registration>, DomainError> {
        Ok(self.registrations.read().await.get(&id).cloned())
    }

    async fn find_stale(
        &self,
        cutoff: Timestamp,
        limit: u32,
    ) -> Result<Vec<RegistrationId>, DomainError> {
        let registrations = self.registrations.read().await;
        let mut stale: Vec<&Registration> = registrations
            .values()
            .filter(|r| r.is_stale(cutoff))
            .collect();
        stale.sort_by_key(|r| r.updated_at());
        Ok(stale
            .into_iter()
            .take(limit as usize)
            .map(|r| r.id())
            .collect())
    }

    async fn find_pending_seat_releases(
        &self,
        limit: u32,
    ) -> Result<Vec<RegistrationId>, DomainError> {
        let registrations = self.registrations.read().await;
        let mut pending: Vec<&Registration> = registrations
            .values()
            .filter(|r| r.seat_release_pending())
            .collect();
        pending.sort_by_key(|r| r.updated_at());
        Ok(pending
            .into_iter()
            .take(limit as usize)
            .map(|r| r.id())
            .collect())
    }
}

/// In-memory quote numbering.
#[derive(Default)]
pub struct InMemoryQuoteSequence {
    counters: Mutex<HashMap<i32, u64>>,
}

impl InMemoryQuoteSequence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuoteSequence for InMemoryQuoteSequence {
    async fn next_value(&self, year: i32) -> Result<u64, DomainError> {
        let mut counters = self.counters.lock().await;
        let counter = counters.entry(year).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{Currency, TrainingSessionId};
    use crate::domain::registration::{
        CancellationReason, LearnerContact, TransitionMarker,
    };
    use crate::ports::Notification;

    fn registration() -> Registration {
        Registration::create(
            RegistrationId::new(),
            TrainingSessionId::new(),
            LearnerContact::new("Ada", "Lovelace", "ada@example.com", None, None).unwrap(),
            Currency::Eur,
            Timestamp::now(),
        )
    }

    fn repo() -> (InMemoryRegistrationRepository, Arc<InMemoryNotificationOutbox>) {
        let outbox = Arc::new(InMemoryNotificationOutbox::new());
        (InMemoryRegistrationRepository::new(outbox.clone()), outbox)
    }

    #[tokio::test]
    async fn update_rejects_stale_version() {
        let (repo, _) = repo();
        let mut r = registration();
        repo.insert(&r).await.unwrap();

        let mut copy = r.clone();

        let expected = r.next_version();
        r.cancel(CancellationReason::LearnerRequested, Timestamp::now())
            .unwrap();
        repo.update(&r, expected, None).await.unwrap();

        let expected = copy.next_version();
        copy.cancel(CancellationReason::HoldExpired, Timestamp::now())
            .unwrap();
        let err = repo.update(&copy, expected, None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ConcurrentModification);

        let stored = repo.find_by_id(r.id()).await.unwrap().unwrap();
        assert_eq!(
            stored.cancellation_reason(),
            Some(CancellationReason::LearnerRequested)
        );
    }

    #[tokio::test]
    async fn update_of_unknown_registration_is_not_found() {
        let (repo, _) = repo();
        let mut r = registration();
        let expected = r.next_version();
        let err = repo.update(&r, expected, None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::RegistrationNotFound);
    }

    #[tokio::test]
    async fn failed_update_does_not_queue_notification() {
        let (repo, outbox) = repo();
        let mut r = registration();
        repo.insert(&r).await.unwrap();

        r.next_version();
        let entry = NotificationOutboxEntry::new(
            r.id(),
            TransitionMarker::RegistrationCancelled,
            Notification::new("ada@example.com", "registration_cancelled", serde_json::json!({})),
            Timestamp::now(),
        );
        assert!(repo.update(&r, 41, Some(&entry)).await.is_err());
        assert!(outbox.all().await.is_empty());
    }

    #[tokio::test]
    async fn find_stale_orders_by_idleness_and_skips_terminal() {
        let (repo, _) = repo();
        let now = Timestamp::now();

        let old = registration();
        let older = registration();
        let fresh = registration();
        let mut done = registration();
        done.cancel(CancellationReason::LearnerRequested, now).unwrap();
        for r in [&old, &older, &fresh, &done] {
            repo.insert(r).await.unwrap();
        }

        repo.backdate(old.id(), now.minus_secs(3600)).await;
        repo.backdate(older.id(), now.minus_secs(7200)).await;
        repo.backdate(done.id(), now.minus_secs(9000)).await;

        let stale = repo.find_stale(now.minus_secs(1800), 10).await.unwrap();
        assert_eq!(stale, vec![older.id(), old.id()]);
    }

    #[tokio::test]
    async fn quote_sequence_is_per_year_and_monotonic() {
        let seq = InMemoryQuoteSequence::new();
        assert_eq!(seq.next_value(2026).await.unwrap(), 1);
        assert_eq!(seq.next_value(2026).await.unwrap(), 2);
        assert_eq!(seq.next_value(2027).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn pending_seat_releases_are_listed_until_cleared() {
        let (repo, _) = repo();
        let mut r = registration();
        repo.insert(&r).await.unwrap();
        repo.insert(&registration()).await.unwrap();
        assert!(repo.find_pending_seat_releases(10).await.unwrap().is_empty());

        let expected = r.next_version();
        r.cancel(CancellationReason::LearnerRequested, Timestamp::now())
            .unwrap();
        r.mark_seat_release_pending().unwrap();
        repo.update(&r, expected, None).await.unwrap();
        assert_eq!(repo.find_pending_seat_releases(10).await.unwrap(), vec![r.id()]);

        let expected = r.next_version();
        r.clear_seat_release_pending();
        repo.update(&r, expected, None).await.unwrap();
        assert!(repo.find_pending_seat_releases(10).await.unwrap().is_empty());
    }
}
