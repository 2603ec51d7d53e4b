//! ConfirmBankTransferHandler - Administrator acknowledges a received transfer.
//!
//! Confirming an already confirmed registration is a no-op that returns the
//! current state; nothing is written and no second receipt is queued.

use std::sync::Arc;

use crate::domain::foundation::{RegistrationId, Timestamp};
use crate::domain::registration::{
    ConfirmOutcome, PaymentMethod, Registration, RegistrationError, RegistrationStatus,
};

use crate::application::RegistrationLifecycle;

/// Command to confirm that a bank transfer arrived.
#[derive(Debug, Clone)]
pub struct ConfirmBankTransferCommand {
    pub registration_id: RegistrationId,
    /// Bank statement reference, if the administrator has one.
    pub transfer_reference: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConfirmBankTransferResult {
    pub registration: Registration,
    pub outcome: ConfirmOutcome,
}

/// Handler for bank transfer confirmation.
pub struct ConfirmBankTransferHandler {
    lifecycle: Arc<RegistrationLifecycle>,
}

impl ConfirmBankTransferHandler {
    pub fn new(lifecycle: Arc<RegistrationLifecycle>) -> Self {
        Self { lifecycle }
    }

    pub async fn handle(
        &self,
        cmd: ConfirmBankTransferCommand,
    ) -> Result<ConfirmBankTransferResult, RegistrationError> {
        let _lock = self.lifecycle.lock(cmd.registration_id).await;
        let (mut registration, session) = self.lifecycle.load(cmd.registration_id).await?;

        if registration.status() == RegistrationStatus::Confirmed {
            return Ok(ConfirmBankTransferResult {
                registration,
                outcome: ConfirmOutcome::AlreadyConfirmed,
            });
        }
        if registration.payment_method() != Some(PaymentMethod::BankTransfer) {
            let err = RegistrationError::invalid_transition(
                registration.status(),
                "confirm a bank transfer for",
            );
            tracing::warn!(registration_id = %cmd.registration_id, error = %err, "Confirmation refused");
            return Err(err);
        }

        let now = Timestamp::now();
        registration.record_payment_received(cmd.transfer_reference, now)?;
        let outcome = registration.confirm(now)?;
        self.lifecycle.commit(&mut registration, &session, now).await?;

        tracing::info!(
            registration_id = %registration.id(),
            quote_number = ?registration.quote_number().map(|q| q.as_str()),
            "Bank transfer confirmed"
        );
        Ok(ConfirmBankTransferResult {
            registration,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::Harness;
    use crate::ports::{NotificationOutbox, RegistrationRepository};
    use crate::domain::foundation::ErrorCode;
    use crate::domain::registration::{CancellationReason, TransitionMarker};

    fn confirm(id: RegistrationId) -> ConfirmBankTransferCommand {
        ConfirmBankTransferCommand {
            registration_id: id,
            transfer_reference: Some("VIR-2026-0042".to_string()),
        }
    }

    #[tokio::test]
    async fn confirms_and_queues_one_receipt() {
        let h = Harness::new();
        let session = h.session(3).await;
        let r = h.register(&session, "ada@example.com").await;
        h.choose_transfer(r.id()).await;

        let result = h.engine.confirm_bank_transfer.handle(confirm(r.id())).await.unwrap();
        assert_eq!(result.outcome, ConfirmOutcome::Applied);
        assert_eq!(result.registration.status(), RegistrationStatus::Confirmed);
        assert_eq!(result.registration.payment_reference(), Some("VIR-2026-0042"));

        let again = h.engine.confirm_bank_transfer.handle(confirm(r.id())).await.unwrap();
        assert_eq!(again.outcome, ConfirmOutcome::AlreadyConfirmed);
        assert_eq!(again.registration.version(), result.registration.version());

        let markers: Vec<_> = h
            .outbox
            .find_by_registration(r.id())
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.marker)
            .collect();
        assert_eq!(
            markers,
            vec![TransitionMarker::QuoteIssued, TransitionMarker::PaymentConfirmed]
        );
        assert_eq!(h.seats_taken(session.id()).await, 1);
    }

    #[tokio::test]
    async fn created_registration_cannot_be_confirmed() {
        let h = Harness::new();
        let session = h.session(3).await;
        let r = h.register(&session, "ada@example.com").await;

        let err = h.engine.confirm_bank_transfer.handle(confirm(r.id())).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidStateTransition);
    }

    #[tokio::test]
    async fn cancelled_registration_cannot_be_confirmed() {
        let h = Harness::new();
        let session = h.session(3).await;
        let r = h.register(&session, "ada@example.com").await;
        h.choose_transfer(r.id()).await;
        h.lifecycle
            .cancel(r.id(), CancellationReason::LearnerRequested, Timestamp::now())
            .await
            .unwrap();

        let err = h.engine.confirm_bank_transfer.handle(confirm(r.id())).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidStateTransition);
        let stored = h.registrations.find_by_id(r.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), RegistrationStatus::Cancelled);
    }
}
