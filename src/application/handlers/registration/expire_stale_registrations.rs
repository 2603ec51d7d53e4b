//! ExpireStaleRegistrationsHandler - Force-cancels abandoned holds.
//!
//! A registration that has sat in Created or PendingPayment longer than the
//! hold timeout is cancelled with `HoldExpired` and its seat goes back to the
//! session. Each candidate is re-checked under its lock, so a learner who
//! acts at the last moment wins over the sweep.
//!
//! The same handler retries seat releases that failed after a cancellation
//! had already committed.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::foundation::Timestamp;
use crate::domain::registration::RegistrationError;

use crate::application::RegistrationLifecycle;

/// Default idle time before a hold is released.
pub const DEFAULT_HOLD_TIMEOUT: Duration = Duration::from_secs(1800);

/// Default number of registrations examined per sweep.
pub const DEFAULT_EXPIRY_BATCH: u32 = 200;

/// Command to run one expiry sweep.
#[derive(Debug, Clone, Copy)]
pub struct ExpireStaleRegistrationsCommand {
    pub now: Timestamp,
}

impl ExpireStaleRegistrationsCommand {
    pub fn now() -> Self {
        Self {
            now: Timestamp::now(),
        }
    }
}

/// Handler for hold expiry.
pub struct ExpireStaleRegistrationsHandler {
    lifecycle: Arc<RegistrationLifecycle>,
    hold_timeout: Duration,
    batch_size: u32,
}

impl ExpireStaleRegistrationsHandler {
    pub fn new(
        lifecycle: Arc<RegistrationLifecycle>,
        hold_timeout: Duration,
        batch_size: u32,
    ) -> Self {
        Self {
            lifecycle,
            hold_timeout,
            batch_size: batch_size.max(1),
        }
    }

    pub fn hold_timeout(&self) -> Duration {
        self.hold_timeout
    }

    /// Returns how many registrations were cancelled.
    pub async fn handle(
        &self,
        cmd: ExpireStaleRegistrationsCommand,
    ) -> Result<usize, RegistrationError> {
        let cutoff = cmd.now.minus_secs(self.hold_timeout.as_secs());
        let candidates = self
            .lifecycle
            .registrations()
            .find_stale(cutoff, self.batch_size)
            .await?;

        let mut expired = 0;
        for id in candidates {
            match self.lifecycle.expire(id, cutoff, cmd.now).await {
                Ok(true) => expired += 1,
                Ok(false) => {
                    tracing::debug!(registration_id = %id, "Hold became active again");
                }
                // Another writer moved the registration on first
                Err(RegistrationError::ConcurrentModification(_))
                | Err(RegistrationError::InvalidTransition { .. }) => {
                    tracing::debug!(registration_id = %id, "Hold already resolved");
                }
                Err(e) => {
                    tracing::error!(registration_id = %id, error = %e, "Failed to expire hold");
                }
            }
        }

        if expired > 0 {
            tracing::info!(expired, cutoff = ?cutoff, "Expired stale registrations");
        }
        Ok(expired)
    }

    /// Returns seats still owed by cancelled registrations.
    ///
    /// Returns how many seats went back to their sessions.
    pub async fn release_pending_seats(&self) -> Result<usize, RegistrationError> {
        let pending = self
            .lifecycle
            .registrations()
            .find_pending_seat_releases(self.batch_size)
            .await?;

        let mut released = 0;
        for id in pending {
            match self.lifecycle.retry_seat_release(id).await {
                Ok(true) => released += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(registration_id = %id, error = %e, "Seat release still failing");
                }
            }
        }
        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::Harness;
    use crate::ports::{NotificationOutbox, RegistrationRepository};
    use crate::domain::registration::{CancellationReason, RegistrationStatus, TransitionMarker};

    #[tokio::test]
    async fn expires_idle_holds_and_frees_seats() {
        let h = Harness::new();
        let session = h.session(2).await;
        let idle = h.register(&session, "idle@example.com").await;
        let active = h.register(&session, "active@example.com").await;
        let now = Timestamp::now();
        h.registrations.backdate(idle.id(), now.minus_secs(3600)).await;

        let expired = h
            .engine
            .expire_stale
            .handle(ExpireStaleRegistrationsCommand { now })
            .await
            .unwrap();

        assert_eq!(expired, 1);
        assert_eq!(h.seats_taken(session.id()).await, 1);
        let stored = h.registrations.find_by_id(idle.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), RegistrationStatus::Cancelled);
        assert_eq!(stored.cancellation_reason(), Some(CancellationReason::HoldExpired));
        let untouched = h.registrations.find_by_id(active.id()).await.unwrap().unwrap();
        assert_eq!(untouched.status(), RegistrationStatus::Created);

        let queued = h.outbox.find_by_registration(idle.id()).await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].marker, TransitionMarker::RegistrationCancelled);
    }

    #[tokio::test]
    async fn pending_bank_transfer_expires_too() {
        let h = Harness::new();
        let session = h.session(1).await;
        let r = h.register(&session, "ada@example.com").await;
        h.choose_transfer(r.id()).await;
        let now = Timestamp::now();
        h.registrations.backdate(r.id(), now.minus_secs(7200)).await;

        let expired = h
            .engine
            .expire_stale
            .handle(ExpireStaleRegistrationsCommand { now })
            .await
            .unwrap();

        assert_eq!(expired, 1);
        assert_eq!(h.seats_taken(session.id()).await, 0);
        h.register(&session, "next@example.com").await;
    }

    #[tokio::test]
    async fn confirmed_registrations_never_expire() {
        let h = Harness::new();
        let session = h.session(1).await;
        let r = h.register(&session, "ada@example.com").await;
        h.choose_card(r.id()).await;
        let now = Timestamp::now();
        h.registrations.backdate(r.id(), now.minus_secs(86_400)).await;

        let expired = h
            .engine
            .expire_stale
            .handle(ExpireStaleRegistrationsCommand { now })
            .await
            .unwrap();
        assert_eq!(expired, 0);
        assert_eq!(h.seats_taken(session.id()).await, 1);
    }

    #[tokio::test]
    async fn racing_cancel_and_expiry_release_once() {
        let h = Harness::new();
        let session = h.session(3).await;
        let r = h.register(&session, "ada@example.com").await;
        h.register(&session, "grace@example.com").await;
        let now = Timestamp::now();
        h.registrations.backdate(r.id(), now.minus_secs(3600)).await;

        let lifecycle = h.lifecycle.clone();
        let id = r.id();
        let cancel = tokio::spawn(async move {
            lifecycle
                .cancel(id, CancellationReason::LearnerRequested, Timestamp::now())
                .await
        });
        let expiry = h
            .engine
            .expire_stale
            .handle(ExpireStaleRegistrationsCommand { now })
            .await
            .unwrap();
        let cancelled = cancel.await.unwrap();

        // Exactly one of the two wins
        assert_eq!(expiry + usize::from(cancelled.is_ok()), 1);
        assert_eq!(h.seats_taken(session.id()).await, 1);
        assert_eq!(h.outbox.find_by_registration(r.id()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_release_is_returned_on_a_later_pass() {
        let h = Harness::new();
        let session = h.session(1).await;
        let r = h.register(&session, "ada@example.com").await;
        // Every try of the guard's release fails
        h.faults.fail_releases(3);

        let cancelled = h
            .lifecycle
            .cancel(r.id(), CancellationReason::LearnerRequested, Timestamp::now())
            .await
            .unwrap();
        assert_eq!(cancelled.status(), RegistrationStatus::Cancelled);
        assert!(cancelled.seat_release_pending());
        assert_eq!(h.seats_taken(session.id()).await, 1);

        let released = h.engine.expire_stale.release_pending_seats().await.unwrap();
        assert_eq!(released, 1);
        assert_eq!(h.seats_taken(session.id()).await, 0);
        let stored = h.registrations.find_by_id(r.id()).await.unwrap().unwrap();
        assert!(!stored.seat_release_pending());

        // Nothing is returned twice
        assert_eq!(h.engine.expire_stale.release_pending_seats().await.unwrap(), 0);
        assert_eq!(h.seats_taken(session.id()).await, 0);
        assert_eq!(h.outbox.find_by_registration(r.id()).await.unwrap().len(), 1);
        h.register(&session, "next@example.com").await;
    }

    #[tokio::test]
    async fn release_keeps_failing_and_stays_pending() {
        let h = Harness::new();
        let session = h.session(2).await;
        let r = h.register(&session, "ada@example.com").await;
        h.faults.fail_releases(6);

        h.lifecycle
            .cancel(r.id(), CancellationReason::AdministratorRequested, Timestamp::now())
            .await
            .unwrap();
        assert_eq!(h.engine.expire_stale.release_pending_seats().await.unwrap(), 0);

        let stored = h.registrations.find_by_id(r.id()).await.unwrap().unwrap();
        assert!(stored.seat_release_pending());
        assert_eq!(h.seats_taken(session.id()).await, 1);

        assert_eq!(h.engine.expire_stale.release_pending_seats().await.unwrap(), 1);
        assert_eq!(h.seats_taken(session.id()).await, 0);
    }
}
