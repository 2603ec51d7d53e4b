//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (ids, money, timestamps, errors)
//! - `billing` - VAT breakdown, quote numbers and document data
//! - `session` - Training sessions and their seat capacity
//! - `registration` - Learner registrations and their payment lifecycle

pub mod billing;
pub mod foundation;
pub mod registration;
pub mod session;
