//! Registration command and query handlers.

// Command handlers
mod cancel_registration;
mod choose_payment_method;
mod confirm_bank_transfer;
mod create_registration;
mod expire_stale_registrations;

// Query handlers
mod get_registration;

pub use cancel_registration::{CancelRegistrationCommand, CancelRegistrationHandler, CancelledBy};
pub use choose_payment_method::{
    ChoosePaymentMethodCommand, ChoosePaymentMethodHandler, ChoosePaymentMethodOutcome,
};
pub use confirm_bank_transfer::{
    ConfirmBankTransferCommand, ConfirmBankTransferHandler, ConfirmBankTransferResult,
};
pub use create_registration::{
    CreateRegistrationCommand, CreateRegistrationHandler, CreateRegistrationResult,
};
pub use expire_stale_registrations::{
    ExpireStaleRegistrationsCommand, ExpireStaleRegistrationsHandler, DEFAULT_EXPIRY_BATCH,
    DEFAULT_HOLD_TIMEOUT,
};

pub use get_registration::{GetRegistrationHandler, GetRegistrationQuery, RegistrationSummary};
