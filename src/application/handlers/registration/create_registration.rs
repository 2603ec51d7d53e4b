//! CreateRegistrationHandler - Claims a seat and opens a registration.
//!
//! The seat is reserved before the registration exists. If the registration
//! cannot be stored the seat goes straight back, so every Created
//! registration corresponds to exactly one counted seat.

use std::sync::Arc;

use crate::domain::foundation::{Currency, RegistrationId, Timestamp, TrainingSessionId};
use crate::domain::registration::{LearnerContact, Registration, RegistrationError};

use crate::application::RegistrationLifecycle;

/// Command to register a learner on a training session.
#[derive(Debug, Clone)]
pub struct CreateRegistrationCommand {
    pub session_id: TrainingSessionId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub currency: Currency,
}

/// Result of a successful registration.
#[derive(Debug, Clone)]
pub struct CreateRegistrationResult {
    pub registration: Registration,
}

impl CreateRegistrationResult {
    pub fn registration_id(&self) -> RegistrationId {
        self.registration.id()
    }
}

/// Handler for creating registrations.
pub struct CreateRegistrationHandler {
    lifecycle: Arc<RegistrationLifecycle>,
}

impl CreateRegistrationHandler {
    pub fn new(lifecycle: Arc<RegistrationLifecycle>) -> Self {
        Self { lifecycle }
    }

    pub async fn handle(
        &self,
        cmd: CreateRegistrationCommand,
    ) -> Result<CreateRegistrationResult, RegistrationError> {
        // 1. Validate learner data before touching capacity
        let learner = LearnerContact::new(
            cmd.first_name,
            cmd.last_name,
            cmd.email,
            cmd.phone,
            cmd.company,
        )?;

        // 2. The session must sell in the requested currency
        let session = self
            .lifecycle
            .sessions()
            .find_by_id(cmd.session_id)
            .await?
            .ok_or(RegistrationError::SessionNotFound(cmd.session_id))?;
        if session.price_for(cmd.currency).is_none() {
            return Err(RegistrationError::price_unavailable(
                cmd.session_id,
                cmd.currency,
            ));
        }

        // 3. Claim the seat
        let token = self
            .lifecycle
            .guard()
            .reserve(cmd.session_id)
            .await
            .map_err(|e| {
                if e.is_denial() {
                    tracing::info!(session_id = %cmd.session_id, reason = %e, "Registration denied");
                }
                RegistrationError::from(e)
            })?;

        // 4. Persist; give the seat back if that fails
        let registration = Registration::create(
            RegistrationId::new(),
            cmd.session_id,
            learner,
            cmd.currency,
            Timestamp::now(),
        );
        if let Err(e) = self.lifecycle.registrations().insert(&registration).await {
            if let Err(release_err) = token.release().await {
                tracing::error!(
                    session_id = %cmd.session_id,
                    error = %release_err,
                    "Failed to release seat after aborted registration"
                );
            }
            return Err(e.into());
        }
        token.commit();

        tracing::info!(
            registration_id = %registration.id(),
            session_id = %cmd.session_id,
            currency = %cmd.currency,
            "Registration created"
        );
        Ok(CreateRegistrationResult { registration })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{learner_command, Harness};
    use crate::ports::{RegistrationRepository, SessionStore};
    use crate::domain::foundation::ErrorCode;
    use crate::domain::registration::RegistrationStatus;

    #[tokio::test]
    async fn creates_registration_and_counts_the_seat() {
        let h = Harness::new();
        let session = h.session(2).await;

        let result = h
            .engine
            .create_registration
            .handle(learner_command(session.id(), "ada@example.com"))
            .await
            .unwrap();

        assert_eq!(result.registration.status(), RegistrationStatus::Created);
        assert_eq!(result.registration.currency(), Currency::Eur);
        assert_eq!(h.seats_taken(session.id()).await, 1);
        assert!(h
            .registrations
            .find_by_id(result.registration_id())
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn full_session_is_denied_with_distinct_code() {
        let h = Harness::new();
        let session = h.session(1).await;
        h.register(&session, "first@example.com").await;

        let err = h
            .engine
            .create_registration
            .handle(learner_command(session.id(), "second@example.com"))
            .await
            .unwrap_err();
        assert_eq!(err, RegistrationError::SessionFull(session.id()));
        assert_eq!(err.code(), ErrorCode::SessionFull);
        assert_eq!(h.seats_taken(session.id()).await, 1);
    }

    #[tokio::test]
    async fn closed_session_is_denied_even_with_free_seats() {
        let h = Harness::new();
        let session = h.session(5).await;
        h.sessions.close(session.id(), Timestamp::now()).await.unwrap();

        let err = h
            .engine
            .create_registration
            .handle(learner_command(session.id(), "ada@example.com"))
            .await
            .unwrap_err();
        assert_eq!(err, RegistrationError::SessionClosed(session.id()));
        assert_ne!(err.message(), RegistrationError::SessionFull(session.id()).message());
    }

    #[tokio::test]
    async fn invalid_learner_data_reserves_nothing() {
        let h = Harness::new();
        let session = h.session(2).await;

        let mut cmd = learner_command(session.id(), "not-an-email");
        cmd.first_name = "  ".to_string();
        let err = h.engine.create_registration.handle(cmd).await.unwrap_err();

        assert!(matches!(err, RegistrationError::ValidationFailed { .. }));
        assert_eq!(h.seats_taken(session.id()).await, 0);
    }

    #[tokio::test]
    async fn unpriced_currency_is_rejected_before_reserving() {
        let h = Harness::new();
        let session = h.session(2).await;

        let mut cmd = learner_command(session.id(), "ada@example.com");
        cmd.currency = Currency::Gbp;
        let err = h.engine.create_registration.handle(cmd).await.unwrap_err();

        assert_eq!(err.code(), ErrorCode::PriceUnavailable);
        assert_eq!(h.seats_taken(session.id()).await, 0);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let h = Harness::new();
        let err = h
            .engine
            .create_registration
            .handle(learner_command(TrainingSessionId::new(), "ada@example.com"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::TrainingSessionNotFound);
    }
}
