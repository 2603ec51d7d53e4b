//! Capacity reservation guard.
//!
//! The only path through which a session's participant count changes. Each
//! reservation is a single atomic check-and-increment in the `SessionStore`,
//! bounded by a deadline. A timeout is transient and retried here with
//! backoff; it is never reported as a denial.
//!
//! A granted seat comes back as a `ReservationToken`, which must be either
//! committed (the registration now owns the seat) or released.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;

use crate::domain::foundation::TrainingSessionId;
use crate::domain::session::CapacityError;
use crate::ports::SessionStore;

/// Deadlines and retry policy for the guard.
#[derive(Debug, Clone)]
pub struct CapacityGuardConfig {
    /// Deadline for one store call.
    pub call_timeout: Duration,
    /// Further tries after a transient failure.
    pub retry_attempts: u32,
    /// Delay before the second try; doubles after that.
    pub retry_backoff: Duration,
}

impl Default for CapacityGuardConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_millis(2000),
            retry_attempts: 3,
            retry_backoff: Duration::from_millis(50),
        }
    }
}

/// Atomic gate in front of the session store.
#[derive(Clone)]
pub struct CapacityGuard {
    store: Arc<dyn SessionStore>,
    config: CapacityGuardConfig,
}

impl CapacityGuard {
    pub fn new(store: Arc<dyn SessionStore>, config: CapacityGuardConfig) -> Self {
        Self { store, config }
    }

    /// Claims one seat.
    ///
    /// # Errors
    ///
    /// - `SessionFull` / `SessionClosed` / `NotFound` are final denials
    /// - `Timeout` / `Infrastructure` once every retry is exhausted
    pub async fn reserve(
        &self,
        session_id: TrainingSessionId,
    ) -> Result<ReservationToken, CapacityError> {
        let attempts = self.config.retry_attempts.saturating_add(1);
        let mut backoff = self.config.retry_backoff;

        for attempt in 1..=attempts {
            let error = match time::timeout(
                self.config.call_timeout,
                self.store.try_reserve(session_id),
            )
            .await
            {
                Ok(Ok(())) => {
                    return Ok(ReservationToken::new(session_id, self.clone()));
                }
                Ok(Err(e)) if !e.is_retryable() => return Err(e),
                Ok(Err(e)) => e,
                Err(_) => CapacityError::timeout(session_id, self.timeout_ms()),
            };

            if attempt == attempts {
                tracing::error!(
                    session_id = %session_id,
                    attempts,
                    error = %error,
                    "Seat reservation gave up"
                );
                return Err(error);
            }

            tracing::warn!(
                session_id = %session_id,
                attempt,
                error = %error,
                "Seat reservation failed transiently; retrying"
            );
            time::sleep(backoff).await;
            backoff = backoff.saturating_mul(2);
        }

        Err(CapacityError::timeout(session_id, self.timeout_ms()))
    }

    /// Returns a seat held by a registration that is leaving the pool.
    ///
    /// Floored at zero by the store. Returns whether a seat was freed.
    pub async fn release(&self, session_id: TrainingSessionId) -> Result<bool, CapacityError> {
        let attempts = self.config.retry_attempts.saturating_add(1);
        let mut last = CapacityError::timeout(session_id, self.timeout_ms());

        for attempt in 1..=attempts {
            match time::timeout(self.config.call_timeout, self.store.release(session_id)).await {
                Ok(Ok(freed)) => return Ok(freed),
                Ok(Err(e)) if !e.is_retryable() => return Err(e),
                Ok(Err(e)) => last = e,
                Err(_) => last = CapacityError::timeout(session_id, self.timeout_ms()),
            }
            if attempt < attempts {
                time::sleep(self.config.retry_backoff).await;
            }
        }
        Err(last)
    }

    fn timeout_ms(&self) -> u64 {
        self.config.call_timeout.as_millis() as u64
    }
}

/// A claim on one seat of one session.
///
/// Not `Clone`: consume it exactly once with [`commit`](Self::commit) or
/// [`release`](Self::release). A token dropped unconsumed returns its seat
/// on a background task.
#[must_use = "a reservation must be committed or released"]
pub struct ReservationToken {
    session_id: TrainingSessionId,
    guard: Option<CapacityGuard>,
}

impl ReservationToken {
    fn new(session_id: TrainingSessionId, guard: CapacityGuard) -> Self {
        Self {
            session_id,
            guard: Some(guard),
        }
    }

    pub fn session_id(&self) -> TrainingSessionId {
        self.session_id
    }

    /// The seat now belongs to a persisted registration.
    pub fn commit(mut self) -> TrainingSessionId {
        self.guard = None;
        self.session_id
    }

    /// Gives the seat back.
    pub async fn release(mut self) -> Result<bool, CapacityError> {
        match self.guard.take() {
            Some(guard) => guard.release(self.session_id).await,
            None => Ok(false),
        }
    }
}

impl Drop for ReservationToken {
    fn drop(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };
        let session_id = self.session_id;
        tracing::warn!(session_id = %session_id, "Reservation dropped unconsumed; releasing seat");

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = guard.release(session_id).await {
                        tracing::error!(
                            session_id = %session_id,
                            error = %e,
                            "Failed to release dropped reservation"
                        );
                    }
                });
            }
            Err(_) => {
                tracing::error!(
                    session_id = %session_id,
                    "No runtime to release dropped reservation; seat leaked"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemorySessionStore;
    use crate::domain::foundation::{Currency, DomainError, Money, Timestamp};
    use crate::domain::session::{SessionDetails, TrainingSession};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn session(max: u32) -> TrainingSession {
        let now = Timestamp::now();
        TrainingSession::create(
            TrainingSessionId::new(),
            SessionDetails {
                course_title: "Async Rust".to_string(),
                location: "Remote".to_string(),
                starts_at: now.add_days(3),
                ends_at: now.add_days(4),
                prices: vec![Money::from_major(100, Currency::Eur)],
                max_participants: max,
            },
            now,
        )
        .unwrap()
    }

    fn fast() -> CapacityGuardConfig {
        CapacityGuardConfig {
            call_timeout: Duration::from_millis(50),
            retry_attempts: 3,
            retry_backoff: Duration::from_millis(1),
        }
    }

    async fn current(store: &InMemorySessionStore, id: TrainingSessionId) -> u32 {
        store
            .find_by_id(id)
            .await
            .unwrap()
            .unwrap()
            .current_participants()
    }

    #[tokio::test]
    async fn commit_keeps_the_seat_and_release_returns_it() {
        let store = Arc::new(InMemorySessionStore::new());
        let s = session(2);
        store.insert(&s).await.unwrap();
        let guard = CapacityGuard::new(store.clone(), fast());

        let kept = guard.reserve(s.id()).await.unwrap();
        assert_eq!(kept.commit(), s.id());

        let returned = guard.reserve(s.id()).await.unwrap();
        assert!(returned.release().await.unwrap());

        assert_eq!(current(&store, s.id()).await, 1);
    }

    #[tokio::test]
    async fn dropped_token_releases_in_background() {
        let store = Arc::new(InMemorySessionStore::new());
        let s = session(1);
        store.insert(&s).await.unwrap();
        let guard = CapacityGuard::new(store.clone(), fast());

        {
            let _token = guard.reserve(s.id()).await.unwrap();
        }
        for _ in 0..50 {
            if current(&store, s.id()).await == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert_eq!(current(&store, s.id()).await, 0);
    }

    #[tokio::test]
    async fn denials_are_not_retried() {
        let store = Arc::new(InMemorySessionStore::new());
        let s = session(1);
        store.insert(&s).await.unwrap();
        let guard = CapacityGuard::new(store.clone(), fast());

        guard.reserve(s.id()).await.unwrap().commit();
        let err = guard.reserve(s.id()).await.err().unwrap();
        assert_eq!(err, CapacityError::session_full(s.id()));
    }

    /// Store that never answers for the first `stalls` calls.
    struct StallingStore {
        inner: InMemorySessionStore,
        stalls: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl SessionStore for StallingStore {
        async fn insert(&self, session: &TrainingSession) -> Result<(), DomainError> {
            self.inner.insert(session).await
        }

        async fn find_by_id(
            &self,
            id: TrainingSessionId,
        ) -> Result<Option<TrainingSession>, DomainError> {
            self.inner.find_by_id(id).await
        }

        async fn try_reserve(&self, id: TrainingSessionId) -> Result<(), CapacityError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.stalls {
                futures::future::pending::<()>().await;
            }
            self.inner.try_reserve(id).await
        }

        async fn release(&self, id: TrainingSessionId) -> Result<bool, CapacityError> {
            self.inner.release(id).await
        }

        async fn close(&self, id: TrainingSessionId, now: Timestamp) -> Result<bool, DomainError> {
            self.inner.close(id, now).await
        }

        async fn close_ended(
            &self,
            now: Timestamp,
        ) -> Result<Vec<TrainingSessionId>, DomainError> {
            self.inner.close_ended(now).await
        }
    }

    #[tokio::test]
    async fn timeout_is_retried_then_granted() {
        let s = session(3);
        let store = Arc::new(StallingStore {
            inner: InMemorySessionStore::new(),
            stalls: 2,
            calls: AtomicU32::new(0),
        });
        store.insert(&s).await.unwrap();
        let guard = CapacityGuard::new(store.clone(), fast());

        let token = guard.reserve(s.id()).await.unwrap();
        token.commit();
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn persistent_timeout_is_transient_not_a_denial() {
        let s = session(3);
        let store = Arc::new(StallingStore {
            inner: InMemorySessionStore::new(),
            stalls: u32::MAX,
            calls: AtomicU32::new(0),
        });
        store.insert(&s).await.unwrap();
        let guard = CapacityGuard::new(store.clone(), fast());

        let err = guard.reserve(s.id()).await.err().unwrap();
        assert!(matches!(err, CapacityError::Timeout { .. }));
        assert!(err.is_retryable());
        assert!(!err.is_denial());
    }
}
