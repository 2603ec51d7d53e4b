//! In-memory adapters.
//!
//! Same semantics as the PostgreSQL adapters, backed by tokio locks. Used by
//! the test suites and for running the engine without a database.

mod notification_outbox;
mod registration_repository;
mod session_store;

pub use notification_outbox::InMemoryNotificationOutbox;
pub use registration_repository::{InMemoryQuoteSequence, InMemoryRegistrationRepository};
pub use session_store::InMemorySessionStore;
