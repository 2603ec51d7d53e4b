//! Registration aggregate entity.
//!
//! A registration is one learner's attempt to attend one training session.
//! It is created only after a seat has been reserved and keeps that seat
//! until it reaches Confirmed or Cancelled.
//!
//! # Design Decisions
//!
//! - **Never deleted**: cancelled registrations stay for audit
//! - **Currency fixed at creation**: every amount derives from it
//! - **Optimistic version**: storage rejects writes based on a stale read
//! - **Effects marker**: the last transition whose side effects were queued

use serde::{Deserialize, Serialize};

use crate::domain::billing::QuoteNumber;
use crate::domain::foundation::{
    Currency, RegistrationId, StateMachine, Timestamp, TrainingSessionId,
};

use super::{
    CancellationReason, LearnerContact, PaymentMethod, PaymentStatus, RegistrationError,
    RegistrationStatus, TransitionMarker,
};

/// Result of a confirmation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// The registration moved to Confirmed now.
    Applied,
    /// It was already Confirmed; nothing changed.
    AlreadyConfirmed,
}

/// Storage shape of a registration, used to rebuild the aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    pub id: RegistrationId,
    pub session_id: TrainingSessionId,
    pub learner: LearnerContact,
    pub currency: Currency,
    pub status: RegistrationStatus,
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: PaymentStatus,
    pub quote_number: Option<QuoteNumber>,
    pub payment_reference: Option<String>,
    pub cancellation_reason: Option<CancellationReason>,
    pub effects_fired: Option<TransitionMarker>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub paid_at: Option<Timestamp>,
    pub cancelled_at: Option<Timestamp>,
    #[serde(default)]
    pub seat_release_pending: bool,
    pub version: u64,
}

/// Registration aggregate.
///
/// # Invariants
///
/// - `session_id` and `currency` never change
/// - status moves forward only; Confirmed is never followed by Cancelled
/// - Confirmed implies `payment_status == Completed` and `paid_at` is set
/// - `quote_number` is only present on the bank-transfer branch
/// - `seat_release_pending` is only ever set on a Cancelled registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    id: RegistrationId,
    session_id: TrainingSessionId,
    learner: LearnerContact,
    currency: Currency,
    status: RegistrationStatus,
    payment_method: Option<PaymentMethod>,
    payment_status: PaymentStatus,
    quote_number: Option<QuoteNumber>,
    payment_reference: Option<String>,
    cancellation_reason: Option<CancellationReason>,
    effects_fired: Option<TransitionMarker>,
    created_at: Timestamp,
    updated_at: Timestamp,
    paid_at: Option<Timestamp>,
    cancelled_at: Option<Timestamp>,
    seat_release_pending: bool,
    version: u64,
}

impl Registration {
    /// Creates a registration for a seat that has already been reserved.
    pub fn create(
        id: RegistrationId,
        session_id: TrainingSessionId,
        learner: LearnerContact,
        currency: Currency,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            session_id,
            learner,
            currency,
            status: RegistrationStatus::Created,
            payment_method: None,
            payment_status: PaymentStatus::Pending,
            quote_number: None,
            payment_reference: None,
            cancellation_reason: None,
            effects_fired: None,
            created_at: now,
            updated_at: now,
            paid_at: None,
            cancelled_at: None,
            seat_release_pending: false,
            version: 0,
        }
    }

    /// Rebuilds a registration from storage without validation.
    pub fn reconstitute(record: RegistrationRecord) -> Self {
        Self {
            id: record.id,
            session_id: record.session_id,
            learner: record.learner,
            currency: record.currency,
            status: record.status,
            payment_method: record.payment_method,
            payment_status: record.payment_status,
            quote_number: record.quote_number,
            payment_reference: record.payment_reference,
            cancellation_reason: record.cancellation_reason,
            effects_fired: record.effects_fired,
            created_at: record.created_at,
            updated_at: record.updated_at,
            paid_at: record.paid_at,
            cancelled_at: record.cancelled_at,
            seat_release_pending: record.seat_release_pending,
            version: record.version,
        }
    }

    /// Flattens the aggregate for storage.
    pub fn to_record(&self) -> RegistrationRecord {
        RegistrationRecord {
            id: self.id,
            session_id: self.session_id,
            learner: self.learner.clone(),
            currency: self.currency,
            status: self.status,
            payment_method: self.payment_method,
            payment_status: self.payment_status,
            quote_number: self.quote_number.clone(),
            payment_reference: self.payment_reference.clone(),
            cancellation_reason: self.cancellation_reason,
            effects_fired: self.effects_fired,
            created_at: self.created_at,
            updated_at: self.updated_at,
            paid_at: self.paid_at,
            cancelled_at: self.cancelled_at,
            seat_release_pending: self.seat_release_pending,
            version: self.version,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn id(&self) -> RegistrationId {
        self.id
    }

    pub fn session_id(&self) -> TrainingSessionId {
        self.session_id
    }

    pub fn learner(&self) -> &LearnerContact {
        &self.learner
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn status(&self) -> RegistrationStatus {
        self.status
    }

    pub fn payment_method(&self) -> Option<PaymentMethod> {
        self.payment_method
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn quote_number(&self) -> Option<&QuoteNumber> {
        self.quote_number.as_ref()
    }

    pub fn payment_reference(&self) -> Option<&str> {
        self.payment_reference.as_deref()
    }

    pub fn cancellation_reason(&self) -> Option<CancellationReason> {
        self.cancellation_reason
    }

    pub fn effects_fired(&self) -> Option<TransitionMarker> {
        self.effects_fired
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    pub fn paid_at(&self) -> Option<Timestamp> {
        self.paid_at
    }

    pub fn cancelled_at(&self) -> Option<Timestamp> {
        self.cancelled_at
    }

    /// Cancelled, but the seat it held has not been returned yet.
    pub fn seat_release_pending(&self) -> bool {
        self.seat_release_pending
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// True while this registration is counted against session capacity.
    pub fn holds_seat(&self) -> bool {
        self.status.holds_seat()
    }

    /// True if the registration still holds a seat and has been idle since
    /// before `cutoff`.
    pub fn is_stale(&self, cutoff: Timestamp) -> bool {
        self.holds_seat() && self.updated_at.is_before(&cutoff)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transitions
    // ─────────────────────────────────────────────────────────────────────────

    /// Created -> PendingPayment with the chosen method.
    pub fn choose_payment_method(
        &mut self,
        method: PaymentMethod,
        now: Timestamp,
    ) -> Result<(), RegistrationError> {
        self.transition(RegistrationStatus::PendingPayment, "choose a payment method for")?;
        self.payment_method = Some(method);
        self.touch(now);
        Ok(())
    }

    /// Attaches the quote reference on the bank-transfer branch.
    pub fn assign_quote(&mut self, quote_number: QuoteNumber) -> Result<(), RegistrationError> {
        if self.status != RegistrationStatus::PendingPayment
            || self.payment_method != Some(PaymentMethod::BankTransfer)
        {
            return Err(RegistrationError::invalid_transition(
                self.status,
                "issue a quote for",
            ));
        }
        if self.quote_number.is_some() {
            return Err(RegistrationError::invalid_transition(
                self.status,
                "issue a second quote for",
            ));
        }
        self.quote_number = Some(quote_number);
        Ok(())
    }

    /// Records money received: a successful card capture or a bank transfer
    /// acknowledged by an administrator.
    pub fn record_payment_received(
        &mut self,
        reference: Option<String>,
        now: Timestamp,
    ) -> Result<(), RegistrationError> {
        if self.status != RegistrationStatus::PendingPayment {
            return Err(RegistrationError::invalid_transition(
                self.status,
                "record a payment for",
            ));
        }
        self.payment_status = self
            .payment_status
            .transition_to(PaymentStatus::Completed)
            .map_err(|_| {
                RegistrationError::invalid_transition(self.status, "record a payment for")
            })?;
        self.payment_reference = reference;
        self.paid_at = Some(now);
        self.touch(now);
        Ok(())
    }

    /// Records a declined or failed capture.
    pub fn record_payment_failed(&mut self, now: Timestamp) -> Result<(), RegistrationError> {
        if self.status != RegistrationStatus::PendingPayment {
            return Err(RegistrationError::invalid_transition(
                self.status,
                "fail the payment of",
            ));
        }
        self.payment_status = self
            .payment_status
            .transition_to(PaymentStatus::Failed)
            .map_err(|_| {
                RegistrationError::invalid_transition(self.status, "fail the payment of")
            })?;
        self.touch(now);
        Ok(())
    }

    /// PendingPayment -> Confirmed. Idempotent on an already Confirmed
    /// registration.
    pub fn confirm(&mut self, now: Timestamp) -> Result<ConfirmOutcome, RegistrationError> {
        if self.status == RegistrationStatus::Confirmed {
            return Ok(ConfirmOutcome::AlreadyConfirmed);
        }
        if self.status == RegistrationStatus::PendingPayment
            && self.payment_status != PaymentStatus::Completed
        {
            return Err(RegistrationError::invalid_transition(
                self.status,
                "confirm an unpaid",
            ));
        }
        self.transition(RegistrationStatus::Confirmed, "confirm")?;
        self.touch(now);
        Ok(ConfirmOutcome::Applied)
    }

    /// Created or PendingPayment -> Cancelled.
    ///
    /// The caller returns the seat once this change is committed.
    pub fn cancel(
        &mut self,
        reason: CancellationReason,
        now: Timestamp,
    ) -> Result<(), RegistrationError> {
        self.transition(RegistrationStatus::Cancelled, "cancel")?;
        self.cancellation_reason = Some(reason);
        self.cancelled_at = Some(now);
        self.touch(now);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Side effects and persistence bookkeeping
    // ─────────────────────────────────────────────────────────────────────────

    /// The side-effect marker the current state calls for, if any.
    pub fn expected_effect(&self) -> Option<TransitionMarker> {
        match (self.status, self.payment_method) {
            (RegistrationStatus::PendingPayment, Some(PaymentMethod::BankTransfer)) => {
                Some(TransitionMarker::QuoteIssued)
            }
            (RegistrationStatus::Confirmed, _) => Some(TransitionMarker::PaymentConfirmed),
            (RegistrationStatus::Cancelled, _) => Some(TransitionMarker::RegistrationCancelled),
            _ => None,
        }
    }

    /// The marker whose effects are due but not yet queued.
    pub fn pending_effect(&self) -> Option<TransitionMarker> {
        self.expected_effect()
            .filter(|marker| self.effects_fired != Some(*marker))
    }

    /// Records that effects for `marker` have been queued.
    pub fn mark_effects_fired(&mut self, marker: TransitionMarker) {
        self.effects_fired = Some(marker);
    }

    /// Flags a Cancelled registration whose seat could not be returned.
    pub fn mark_seat_release_pending(&mut self) -> Result<(), RegistrationError> {
        if self.status != RegistrationStatus::Cancelled {
            return Err(RegistrationError::invalid_transition(
                self.status,
                "flag a seat release for",
            ));
        }
        self.seat_release_pending = true;
        Ok(())
    }

    /// The seat has been returned to the session.
    pub fn clear_seat_release_pending(&mut self) {
        self.seat_release_pending = false;
    }

    /// Advances the version before a write and returns the version the
    /// stored row must still carry.
    pub fn next_version(&mut self) -> u64 {
        let expected = self.version;
        self.version += 1;
        expected
    }

    fn transition(
        &mut self,
        target: RegistrationStatus,
        attempted: &str,
    ) -> Result<(), RegistrationError> {
        self.status = self
            .status
            .transition_to(target)
            .map_err(|_| RegistrationError::invalid_transition(self.status, attempted))?;
        Ok(())
    }

    fn touch(&mut self, now: Timestamp) {
        self.updated_at = now;
    }
}
