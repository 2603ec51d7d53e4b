//! Stripe card capture adapter.
//!
//! Implements the `PaymentCapture` port against Stripe PaymentIntents.
//!
//! # Security
//!
//! - The API key is held as `secrecy::SecretString` and redacted from `Debug`
//! - Every capture carries an `Idempotency-Key` header, so a retried call
//!   never charges twice
//!
//! # Configuration
//!
//! Required environment variables:
//! - `TRAINING_ENROLLMENT__PAYMENT__STRIPE_API_KEY`: Stripe secret API key

mod capture_adapter;
mod mock_capture;

pub use capture_adapter::{StripeCaptureAdapter, StripeConfig};
pub use mock_capture::MockPaymentCapture;
