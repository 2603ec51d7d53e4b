//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `postgres` - Session, registration, quote and outbox persistence
//! - `memory` - In-memory persistence with the same semantics
//! - `stripe` - Card capture
//! - `document` - Receipt and quote rendering
//! - `email` - Transactional email
//! - `notification` - Outbox relay
//! - `scheduler` - Session sweeper and hold reaper

pub mod document;
pub mod email;
pub mod memory;
pub mod notification;
pub mod postgres;
pub mod scheduler;
pub mod stripe;

pub use document::TextDocumentRenderer;
pub use email::{RecordingNotificationSink, ResendConfig, ResendNotificationSink};
pub use memory::{
    InMemoryNotificationOutbox, InMemoryQuoteSequence, InMemoryRegistrationRepository,
    InMemorySessionStore,
};
pub use notification::{DeliveryStats, NotificationRelay, NotificationRelayConfig};
pub use postgres::{
    PostgresNotificationOutbox, PostgresQuoteSequence, PostgresRegistrationRepository,
    PostgresSessionStore,
};
pub use scheduler::{HoldReaper, SessionSweeper};
pub use stripe::{MockPaymentCapture, StripeCaptureAdapter, StripeConfig};
