//! Registration domain module.
//!
//! One learner's enrollment in one training session, from seat reservation
//! to confirmation or cancellation.
//!
//! # Module Structure
//!
//! - `aggregate` - Registration aggregate and its transitions
//! - `status` - RegistrationStatus state machine
//! - `payment` - PaymentMethod, PaymentStatus, CancellationReason
//! - `learner` - LearnerContact value object
//! - `transition` - TransitionMarker for exactly-once side effects
//! - `errors` - RegistrationError

mod aggregate;
mod errors;
mod learner;
mod payment;
mod status;
mod transition;

pub use aggregate::{ConfirmOutcome, Registration, RegistrationRecord};
pub use errors::RegistrationError;
pub use learner::LearnerContact;
pub use payment::{CancellationReason, PaymentMethod, PaymentStatus};
pub use status::RegistrationStatus;
pub use transition::TransitionMarker;
