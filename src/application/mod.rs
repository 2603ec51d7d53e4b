//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Handlers are thin; the shared write path (locking, optimistic commit,
//! outbox entry, seat release) lives in [`RegistrationLifecycle`].

mod billing;
mod capacity_guard;
mod effects;
pub mod engine;
pub mod handlers;
mod lifecycle;
mod payment_router;
mod registration_locks;

#[cfg(test)]
pub(crate) mod test_support;

pub use billing::BillingPolicy;
pub use capacity_guard::{CapacityGuard, CapacityGuardConfig, ReservationToken};
pub use effects::TransitionEffects;
pub use engine::{EnrollmentEngine, EnrollmentPorts, EnrollmentSettings};
pub use lifecycle::RegistrationLifecycle;
pub use payment_router::{CaptureConfig, PaymentRouter};
pub use registration_locks::RegistrationLocks;

pub use handlers::{
    // Session handlers
    CloseSessionCommand, CloseSessionHandler, CreateSessionCommand, CreateSessionHandler,
    CreateSessionResult, SweepExpiredSessionsHandler,
    // Registration handlers
    CancelRegistrationCommand, CancelRegistrationHandler, CancelledBy,
    ChoosePaymentMethodCommand, ChoosePaymentMethodHandler, ChoosePaymentMethodOutcome,
    ConfirmBankTransferCommand, ConfirmBankTransferHandler, ConfirmBankTransferResult,
    CreateRegistrationCommand, CreateRegistrationHandler, CreateRegistrationResult,
    ExpireStaleRegistrationsCommand, ExpireStaleRegistrationsHandler, GetRegistrationHandler,
    GetRegistrationQuery, RegistrationSummary,
};
