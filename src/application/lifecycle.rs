//! Registration lifecycle core shared by the command handlers.
//!
//! Every write to a registration goes through [`RegistrationLifecycle::commit`]:
//! the version is advanced, the pending side effect (if any) is rendered into
//! an outbox entry, and both are persisted in one atomic step.
//!
//! Cancellation returns the seat only after the Cancelled state has
//! committed, so a lost race never frees a seat twice. This is the reverse
//! of releasing first and marking Cancelled second, which would free the
//! seat of a registration whose cancellation then fails to commit. A release
//! that fails after the commit is flagged on the registration and retried
//! by [`RegistrationLifecycle::retry_seat_release`].

use std::sync::Arc;

use tokio::sync::OwnedMutexGuard;

use crate::domain::billing::AmountBreakdown;
use crate::domain::foundation::{RegistrationId, Timestamp};
use crate::domain::registration::{
    CancellationReason, Registration, RegistrationError, TransitionMarker,
};
use crate::domain::session::TrainingSession;
use crate::ports::{RegistrationRepository, SessionStore};

use super::{CapacityGuard, RegistrationLocks, TransitionEffects};

/// Shared persistence, locking and side-effect plumbing.
pub struct RegistrationLifecycle {
    registrations: Arc<dyn RegistrationRepository>,
    sessions: Arc<dyn SessionStore>,
    guard: CapacityGuard,
    effects: TransitionEffects,
    locks: RegistrationLocks,
}

impl RegistrationLifecycle {
    pub fn new(
        registrations: Arc<dyn RegistrationRepository>,
        sessions: Arc<dyn SessionStore>,
        guard: CapacityGuard,
        effects: TransitionEffects,
    ) -> Self {
        Self {
            registrations,
            sessions,
            guard,
            effects,
            locks: RegistrationLocks::new(),
        }
    }

    pub fn registrations(&self) -> &Arc<dyn RegistrationRepository> {
        &self.registrations
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    pub fn guard(&self) -> &CapacityGuard {
        &self.guard
    }

    /// Exclusive access to one registration within this process.
    pub async fn lock(&self, id: RegistrationId) -> OwnedMutexGuard<()> {
        self.locks.acquire(id).await
    }

    /// Loads a registration together with its session.
    pub async fn load(
        &self,
        id: RegistrationId,
    ) -> Result<(Registration, TrainingSession), RegistrationError> {
        let registration = self
            .registrations
            .find_by_id(id)
            .await?
            .ok_or(RegistrationError::NotFound(id))?;
        let session = self
            .sessions
            .find_by_id(registration.session_id())
            .await?
            .ok_or(RegistrationError::SessionNotFound(registration.session_id()))?;
        Ok((registration, session))
    }

    pub fn amounts(
        &self,
        session: &TrainingSession,
        registration: &Registration,
    ) -> Result<AmountBreakdown, RegistrationError> {
        self.effects.billing().amounts(session, registration)
    }

    /// Persists the registration with its pending side effect.
    ///
    /// Returns the marker whose notification was queued, if any.
    pub async fn commit(
        &self,
        registration: &mut Registration,
        session: &TrainingSession,
        now: Timestamp,
    ) -> Result<Option<TransitionMarker>, RegistrationError> {
        let expected_version = registration.next_version();

        let marker = registration.pending_effect();
        let entry = match marker {
            Some(marker) => {
                registration.mark_effects_fired(marker);
                let amounts = self.amounts(session, registration)?;
                Some(
                    self.effects
                        .outbox_entry(registration, session, amounts, marker, now),
                )
            }
            None => None,
        };

        self.registrations
            .update(registration, expected_version, entry.as_ref())
            .await?;

        tracing::info!(
            registration_id = %registration.id(),
            status = %registration.status(),
            version = registration.version(),
            notification = ?marker.map(|m| m.as_str()),
            "Registration committed"
        );
        Ok(marker)
    }

    /// Cancels a registration and frees its seat.
    pub async fn cancel(
        &self,
        id: RegistrationId,
        reason: CancellationReason,
        now: Timestamp,
    ) -> Result<Registration, RegistrationError> {
        let _lock = self.lock(id).await;
        let (mut registration, session) = self.load(id).await?;
        self.cancel_locked(&mut registration, &session, reason, now)
            .await?;
        Ok(registration)
    }

    /// Cancels a hold that is still idle since before `cutoff`.
    ///
    /// Returns `false` when the registration moved on in the meantime.
    pub async fn expire(
        &self,
        id: RegistrationId,
        cutoff: Timestamp,
        now: Timestamp,
    ) -> Result<bool, RegistrationError> {
        let _lock = self.lock(id).await;
        let (mut registration, session) = self.load(id).await?;
        if !registration.is_stale(cutoff) {
            return Ok(false);
        }
        self.cancel_locked(&mut registration, &session, CancellationReason::HoldExpired, now)
            .await?;
        Ok(true)
    }

    /// Cancels a registration the caller has already locked and loaded.
    pub async fn cancel_locked(
        &self,
        registration: &mut Registration,
        session: &TrainingSession,
        reason: CancellationReason,
        now: Timestamp,
    ) -> Result<(), RegistrationError> {
        let held_seat = registration.holds_seat();
        registration.cancel(reason, now).map_err(|e| {
            tracing::warn!(
                registration_id = %registration.id(),
                reason = %reason,
                error = %e,
                "Cancellation refused"
            );
            e
        })?;

        self.commit(registration, session, now).await?;

        if held_seat {
            self.release_seat(registration, session, now).await;
        }
        tracing::info!(
            registration_id = %registration.id(),
            session_id = %registration.session_id(),
            reason = %reason,
            "Registration cancelled"
        );
        Ok(())
    }

    /// Returns a seat whose release failed during cancellation.
    ///
    /// Returns `false` when no release was pending any more. If the flag
    /// cannot be cleared after the seat is returned, the next retry frees
    /// the seat a second time; the error is logged with both ids.
    pub async fn retry_seat_release(&self, id: RegistrationId) -> Result<bool, RegistrationError> {
        let _lock = self.lock(id).await;
        let (mut registration, session) = self.load(id).await?;
        if !registration.seat_release_pending() {
            return Ok(false);
        }

        self.guard.release(registration.session_id()).await?;
        registration.clear_seat_release_pending();
        if let Err(e) = self.commit(&mut registration, &session, Timestamp::now()).await {
            tracing::error!(
                registration_id = %id,
                session_id = %registration.session_id(),
                error = %e,
                "Seat returned but pending release not cleared"
            );
            return Err(e);
        }

        tracing::info!(
            registration_id = %id,
            session_id = %registration.session_id(),
            "Pending seat release completed"
        );
        Ok(true)
    }

    async fn release_seat(
        &self,
        registration: &mut Registration,
        session: &TrainingSession,
        now: Timestamp,
    ) {
        let session_id = registration.session_id();
        match self.guard.release(session_id).await {
            Ok(true) => {}
            Ok(false) => tracing::error!(
                registration_id = %registration.id(),
                session_id = %session_id,
                "Seat count was already zero on release"
            ),
            Err(e) => {
                tracing::error!(
                    registration_id = %registration.id(),
                    session_id = %session_id,
                    error = %e,
                    "Failed to release seat; queued for retry"
                );
                if let Err(e) = self.flag_seat_release(registration, session, now).await {
                    tracing::error!(
                        registration_id = %registration.id(),
                        session_id = %session_id,
                        error = %e,
                        "Failed to record pending seat release; seat leaked"
                    );
                }
            }
        }
    }

    async fn flag_seat_release(
        &self,
        registration: &mut Registration,
        session: &TrainingSession,
        now: Timestamp,
    ) -> Result<(), RegistrationError> {
        registration.mark_seat_release_pending()?;
        self.commit(registration, session, now).await?;
        Ok(())
    }
}
