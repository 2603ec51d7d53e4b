//! ChoosePaymentMethodHandler - Moves a registration into payment.
//!
//! - **Card**: the registration is committed as PendingPayment, the card is
//!   charged, and the outcome is committed as Confirmed or Cancelled. A
//!   decline is a normal outcome, not an error.
//! - **BankTransfer**: a quote number is allocated and the registration
//!   stays in PendingPayment until an administrator confirms the transfer.
//!
//! The registration lock is held for the whole call, so a hold expiry or a
//! cancellation cannot interleave with a capture in flight.
//!
//! A card charge is never lost once the gateway accepts it. Storing the
//! confirmation is retried with backoff, and if it still fails the learner
//! can submit the card again: a registration left in PendingPayment by an
//! earlier card attempt re-runs the capture under the same idempotency key,
//! and the gateway answers with the original charge.

use std::sync::Arc;

use tokio::time;

use crate::domain::billing::{AmountBreakdown, QuoteNumber};
use crate::domain::foundation::{RegistrationId, Timestamp};
use crate::domain::registration::{
    CancellationReason, PaymentMethod, PaymentStatus, Registration, RegistrationError,
    RegistrationStatus,
};
use crate::domain::session::TrainingSession;

use crate::application::{PaymentRouter, RegistrationLifecycle};

/// Tries at storing a captured card payment before giving up.
pub const CAPTURED_COMMIT_ATTEMPTS: u32 = 3;

/// Command to choose how a registration is paid.
#[derive(Debug, Clone)]
pub struct ChoosePaymentMethodCommand {
    pub registration_id: RegistrationId,
    pub method: PaymentMethod,
    /// Gateway token; required for card payments.
    pub payment_token: Option<String>,
}

/// Where the registration ended up.
#[derive(Debug, Clone)]
pub enum ChoosePaymentMethodOutcome {
    /// Card captured; the seat is permanent.
    Confirmed {
        registration: Registration,
        amounts: AmountBreakdown,
    },
    /// Waiting for a bank transfer against the quote.
    PendingPayment {
        registration: Registration,
        quote_number: QuoteNumber,
        amounts: AmountBreakdown,
    },
    /// Payment failed; the seat has been released.
    Cancelled {
        registration: Registration,
        reason: CancellationReason,
        /// Gateway explanation, e.g. "Your card was declined."
        detail: String,
    },
}

impl ChoosePaymentMethodOutcome {
    pub fn registration(&self) -> &Registration {
        match self {
            ChoosePaymentMethodOutcome::Confirmed { registration, .. }
            | ChoosePaymentMethodOutcome::PendingPayment { registration, .. }
            | ChoosePaymentMethodOutcome::Cancelled { registration, .. } => registration,
        }
    }
}

/// Handler for choosing a payment method.
pub struct ChoosePaymentMethodHandler {
    lifecycle: Arc<RegistrationLifecycle>,
    router: Arc<PaymentRouter>,
}

impl ChoosePaymentMethodHandler {
    pub fn new(lifecycle: Arc<RegistrationLifecycle>, router: Arc<PaymentRouter>) -> Self {
        Self { lifecycle, router }
    }

    pub async fn handle(
        &self,
        cmd: ChoosePaymentMethodCommand,
    ) -> Result<ChoosePaymentMethodOutcome, RegistrationError> {
        let token = match cmd.method {
            PaymentMethod::Card => Some(
                cmd.payment_token
                    .as_deref()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| {
                        RegistrationError::validation(
                            "payment_token",
                            "a card payment needs a payment token",
                        )
                    })?
                    .to_string(),
            ),
            PaymentMethod::BankTransfer => None,
        };

        let _lock = self.lifecycle.lock(cmd.registration_id).await;
        let (mut registration, session) = self.lifecycle.load(cmd.registration_id).await?;
        let amounts = self.lifecycle.amounts(&session, &registration)?;
        let now = Timestamp::now();

        let resuming = cmd.method == PaymentMethod::Card && awaits_card_capture(&registration);
        if resuming {
            tracing::info!(
                registration_id = %cmd.registration_id,
                "Resuming unfinished card payment"
            );
        } else {
            registration
                .choose_payment_method(cmd.method, now)
                .map_err(|e| {
                    tracing::warn!(
                        registration_id = %cmd.registration_id,
                        method = %cmd.method,
                        error = %e,
                        "Payment method refused"
                    );
                    e
                })?;
        }

        match token {
            Some(token) => {
                if !resuming {
                    // Record the choice before charging, so a crash
                    // mid-capture leaves a PendingPayment hold that can be
                    // resumed or reaped.
                    self.lifecycle.commit(&mut registration, &session, now).await?;
                }
                self.pay_by_card(registration, &session, amounts, &token)
                    .await
            }
            None => {
                self.pay_by_transfer(registration, &session, amounts, now)
                    .await
            }
        }
    }

    async fn pay_by_transfer(
        &self,
        mut registration: Registration,
        session: &TrainingSession,
        amounts: AmountBreakdown,
        now: Timestamp,
    ) -> Result<ChoosePaymentMethodOutcome, RegistrationError> {
        let quote_number = self.router.issue_quote(now).await?;
        registration.assign_quote(quote_number.clone())?;
        self.lifecycle.commit(&mut registration, session, now).await?;

        tracing::info!(
            registration_id = %registration.id(),
            quote_number = %quote_number.as_str(),
            amount_due = %amounts.amount_due(),
            "Quote issued"
        );
        Ok(ChoosePaymentMethodOutcome::PendingPayment {
            registration,
            quote_number,
            amounts,
        })
    }

    async fn pay_by_card(
        &self,
        mut registration: Registration,
        session: &TrainingSession,
        amounts: AmountBreakdown,
        token: &str,
    ) -> Result<ChoosePaymentMethodOutcome, RegistrationError> {
        match self
            .router
            .capture_card(&registration, session, &amounts, token)
            .await
        {
            Ok(receipt) => {
                let registration = self
                    .store_captured(registration, session, &receipt.reference)
                    .await?;

                tracing::info!(
                    registration_id = %registration.id(),
                    payment_reference = %receipt.reference,
                    amount = %amounts.amount_due(),
                    "Card payment captured"
                );
                Ok(ChoosePaymentMethodOutcome::Confirmed {
                    registration,
                    amounts,
                })
            }
            Err(payment_error) => {
                let now = Timestamp::now();
                tracing::info!(
                    registration_id = %registration.id(),
                    code = %payment_error.code,
                    error = %payment_error.message,
                    "Card payment failed"
                );
                registration.record_payment_failed(now)?;
                self.lifecycle
                    .cancel_locked(
                        &mut registration,
                        session,
                        CancellationReason::PaymentFailed,
                        now,
                    )
                    .await?;
                Ok(ChoosePaymentMethodOutcome::Cancelled {
                    registration,
                    reason: CancellationReason::PaymentFailed,
                    detail: payment_error.message,
                })
            }
        }
    }

    /// Persists a captured charge as Confirmed, retrying transient failures.
    ///
    /// Each retry starts from the stored registration, since a failed write
    /// may still have been applied.
    async fn store_captured(
        &self,
        registration: Registration,
        session: &TrainingSession,
        reference: &str,
    ) -> Result<Registration, RegistrationError> {
        let id = registration.id();
        let mut backoff = self.router.config().retry_backoff;
        let mut current = Some(registration);

        for attempt in 1..=CAPTURED_COMMIT_ATTEMPTS {
            let loaded = match current.take() {
                Some(registration) => Ok(registration),
                None => self.lifecycle.load(id).await.map(|(registration, _)| registration),
            };
            let result = match loaded {
                Ok(mut registration) => self
                    .confirm_captured(&mut registration, session, reference)
                    .await
                    .map(|()| registration),
                Err(e) => Err(e),
            };

            match result {
                Ok(registration) => return Ok(registration),
                Err(e) if e.is_retryable() && attempt < CAPTURED_COMMIT_ATTEMPTS => {
                    tracing::warn!(
                        registration_id = %id,
                        attempt,
                        error = %e,
                        "Storing captured payment failed; retrying"
                    );
                    time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(e) => {
                    tracing::error!(
                        registration_id = %id,
                        payment_reference = %reference,
                        error = %e,
                        "Card charged but confirmation not stored"
                    );
                    return Err(e);
                }
            }
        }

        Err(RegistrationError::infrastructure(
            "Storing the captured payment failed",
        ))
    }

    async fn confirm_captured(
        &self,
        registration: &mut Registration,
        session: &TrainingSession,
        reference: &str,
    ) -> Result<(), RegistrationError> {
        if registration.status() == RegistrationStatus::Confirmed {
            return Ok(());
        }
        let now = Timestamp::now();
        registration.record_payment_received(Some(reference.to_string()), now)?;
        registration.confirm(now)?;
        self.lifecycle.commit(registration, session, now).await?;
        Ok(())
    }
}

/// A card attempt that was recorded but never settled.
fn awaits_card_capture(registration: &Registration) -> bool {
    registration.status() == RegistrationStatus::PendingPayment
        && registration.payment_method() == Some(PaymentMethod::Card)
        && registration.payment_status() == PaymentStatus::Pending
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::Harness;
    use crate::domain::foundation::{Currency, ErrorCode, Money};
    use crate::domain::registration::{PaymentStatus, RegistrationStatus, TransitionMarker};
    use crate::ports::{NotificationOutbox, PaymentError, RegistrationRepository};

    fn card(id: RegistrationId) -> ChoosePaymentMethodCommand {
        ChoosePaymentMethodCommand {
            registration_id: id,
            method: PaymentMethod::Card,
            payment_token: Some("pm_card_visa".to_string()),
        }
    }

    fn transfer(id: RegistrationId) -> ChoosePaymentMethodCommand {
        ChoosePaymentMethodCommand {
            registration_id: id,
            method: PaymentMethod::BankTransfer,
            payment_token: None,
        }
    }

    #[tokio::test]
    async fn card_success_confirms_and_queues_receipt() {
        let h = Harness::new();
        let session = h.session(3).await;
        let r = h.register(&session, "ada@example.com").await;

        let outcome = h.engine.choose_payment_method.handle(card(r.id())).await.unwrap();

        let ChoosePaymentMethodOutcome::Confirmed { registration, amounts } = outcome else {
            panic!("expected confirmation");
        };
        assert_eq!(registration.status(), RegistrationStatus::Confirmed);
        assert_eq!(registration.payment_status(), PaymentStatus::Completed);
        assert_eq!(registration.payment_reference(), Some("pi_mock_1"));
        assert!(registration.paid_at().is_some());
        assert_eq!(amounts.ttc, Money::from_minor(120_000, Currency::Eur));

        let queued = h.outbox.find_by_registration(r.id()).await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].marker, TransitionMarker::PaymentConfirmed);
        assert!(queued[0].notification.attachment.is_some());
        assert_eq!(h.seats_taken(session.id()).await, 1);
    }

    #[tokio::test]
    async fn card_decline_cancels_and_frees_the_seat() {
        let h = Harness::new();
        h.capture
            .push_outcome(Err(PaymentError::card_declined("Your card was declined.")))
            .await;
        let session = h.session(3).await;
        let r = h.register(&session, "ada@example.com").await;

        let outcome = h.engine.choose_payment_method.handle(card(r.id())).await.unwrap();

        let ChoosePaymentMethodOutcome::Cancelled { registration, reason, detail } = outcome else {
            panic!("expected cancellation");
        };
        assert_eq!(reason, CancellationReason::PaymentFailed);
        assert_eq!(detail, "Your card was declined.");
        assert_eq!(registration.status(), RegistrationStatus::Cancelled);
        assert_eq!(registration.payment_status(), PaymentStatus::Failed);
        assert_eq!(h.seats_taken(session.id()).await, 0);

        let queued = h.outbox.find_by_registration(r.id()).await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].marker, TransitionMarker::RegistrationCancelled);
    }

    #[tokio::test]
    async fn exhausted_gateway_retries_also_cancel() {
        let h = Harness::new();
        for _ in 0..3 {
            h.capture.push_outcome(Err(PaymentError::network("reset"))).await;
        }
        let session = h.session(3).await;
        let r = h.register(&session, "ada@example.com").await;

        let outcome = h.engine.choose_payment_method.handle(card(r.id())).await.unwrap();
        assert!(matches!(outcome, ChoosePaymentMethodOutcome::Cancelled { .. }));
        assert_eq!(h.capture.call_count().await, 3);
        assert_eq!(h.seats_taken(session.id()).await, 0);
    }

    #[tokio::test]
    async fn missing_token_changes_nothing() {
        let h = Harness::new();
        let session = h.session(3).await;
        let r = h.register(&session, "ada@example.com").await;

        let mut cmd = card(r.id());
        cmd.payment_token = Some("   ".to_string());
        let err = h.engine.choose_payment_method.handle(cmd).await.unwrap_err();

        assert_eq!(err.code(), ErrorCode::ValidationFailed);
        let stored = h.registrations.find_by_id(r.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), RegistrationStatus::Created);
        assert_eq!(h.capture.call_count().await, 0);
    }

    #[tokio::test]
    async fn bank_transfer_issues_quote_and_waits() {
        let h = Harness::new();
        let session = h.session(3).await;
        let r = h.register(&session, "ada@example.com").await;

        let outcome = h.engine.choose_payment_method.handle(transfer(r.id())).await.unwrap();

        let ChoosePaymentMethodOutcome::PendingPayment { registration, quote_number, amounts } =
            outcome
        else {
            panic!("expected pending payment");
        };
        assert_eq!(registration.status(), RegistrationStatus::PendingPayment);
        assert_eq!(registration.payment_status(), PaymentStatus::Pending);
        assert_eq!(registration.quote_number(), Some(&quote_number));
        assert_eq!(amounts.ttc.to_decimal_string(), "1200.00");
        assert_eq!(h.capture.call_count().await, 0);

        let queued = h.outbox.find_by_registration(r.id()).await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].marker, TransitionMarker::QuoteIssued);
        assert_eq!(queued[0].notification.data["quote_number"], quote_number.as_str());
    }

    #[tokio::test]
    async fn second_choice_is_an_invalid_transition() {
        let h = Harness::new();
        let session = h.session(3).await;
        let r = h.register(&session, "ada@example.com").await;
        h.engine.choose_payment_method.handle(transfer(r.id())).await.unwrap();

        let err = h.engine.choose_payment_method.handle(card(r.id())).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidStateTransition);
        assert_eq!(h.capture.call_count().await, 0);
    }

    #[tokio::test]
    async fn captured_payment_survives_a_failed_confirmation_write() {
        let h = Harness::new();
        let session = h.session(3).await;
        let r = h.register(&session, "ada@example.com").await;
        // The PendingPayment write goes through, the Confirmed write fails once
        h.faults.fail_updates(1, 1);

        let outcome = h.engine.choose_payment_method.handle(card(r.id())).await.unwrap();

        assert!(matches!(outcome, ChoosePaymentMethodOutcome::Confirmed { .. }));
        assert_eq!(h.capture.call_count().await, 1);
        let stored = h.registrations.find_by_id(r.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), RegistrationStatus::Confirmed);
        assert_eq!(stored.payment_reference(), Some("pi_mock_1"));
        let queued = h.outbox.find_by_registration(r.id()).await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].marker, TransitionMarker::PaymentConfirmed);
    }

    #[tokio::test]
    async fn unconfirmed_card_payment_can_be_resubmitted() {
        let h = Harness::new();
        let session = h.session(3).await;
        let r = h.register(&session, "ada@example.com").await;
        h.faults.fail_updates(1, CAPTURED_COMMIT_ATTEMPTS);

        let err = h.engine.choose_payment_method.handle(card(r.id())).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::DatabaseError);
        let stored = h.registrations.find_by_id(r.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), RegistrationStatus::PendingPayment);
        assert_eq!(stored.payment_method(), Some(PaymentMethod::Card));
        assert_eq!(stored.payment_status(), PaymentStatus::Pending);

        let outcome = h.engine.choose_payment_method.handle(card(r.id())).await.unwrap();
        assert!(matches!(outcome, ChoosePaymentMethodOutcome::Confirmed { .. }));

        // Same key on both charges, so the gateway replays the first one
        let keys: Vec<_> = h
            .capture
            .calls()
            .await
            .into_iter()
            .map(|c| c.idempotency_key)
            .collect();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0], keys[1]);

        // A confirmed registration is out of reach of the hold reaper
        let now = Timestamp::now();
        h.registrations.backdate(r.id(), now.minus_secs(86_400)).await;
        let expired = h
            .engine
            .expire_stale
            .handle(crate::application::ExpireStaleRegistrationsCommand { now })
            .await
            .unwrap();
        assert_eq!(expired, 0);
        assert_eq!(h.seats_taken(session.id()).await, 1);
    }
}
