//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresSessionStore` - Sessions with conditional-update seat counting
//! - `PostgresRegistrationRepository` - Registrations with version CAS
//! - `PostgresQuoteSequence` - Per-year quote numbering
//! - `PostgresNotificationOutbox` - Outbox with `SKIP LOCKED` claiming

mod notification_outbox;
mod registration_repository;
mod session_store;

pub use notification_outbox::PostgresNotificationOutbox;
pub use registration_repository::{PostgresQuoteSequence, PostgresRegistrationRepository};
pub use session_store::PostgresSessionStore;
