//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations.

pub mod registration;
pub mod session;

pub use registration::{
    CancelRegistrationCommand, CancelRegistrationHandler, CancelledBy,
    ChoosePaymentMethodCommand, ChoosePaymentMethodHandler, ChoosePaymentMethodOutcome,
    ConfirmBankTransferCommand, ConfirmBankTransferHandler, ConfirmBankTransferResult,
    CreateRegistrationCommand, CreateRegistrationHandler, CreateRegistrationResult,
    ExpireStaleRegistrationsCommand, ExpireStaleRegistrationsHandler, GetRegistrationHandler,
    GetRegistrationQuery, RegistrationSummary,
};
pub use session::{
    CloseSessionCommand, CloseSessionHandler, CreateSessionCommand, CreateSessionHandler,
    CreateSessionResult, SweepExpiredSessionsHandler,
};
