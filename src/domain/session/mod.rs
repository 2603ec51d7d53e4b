//! Training session domain module.
//!
//! Scheduled course runs with a fixed number of seats.
//!
//! # Module Structure
//!
//! - `aggregate` - TrainingSession aggregate and its capacity rules
//! - `errors` - CapacityError

mod aggregate;
mod errors;

pub use aggregate::{SessionDetails, TrainingSession, MAX_LABEL_LENGTH, MAX_PARTICIPANTS};
pub use errors::CapacityError;
