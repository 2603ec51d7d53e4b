//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Persistence Ports
//!
//! - `SessionStore` - Training sessions and atomic seat counting
//! - `RegistrationRepository` - Registrations with optimistic locking
//! - `QuoteSequence` - Quote number allocation
//! - `NotificationOutbox` - Transactional outbox for learner notifications
//!
//! ## External Service Ports
//!
//! - `PaymentCapture` - Card gateway
//! - `DocumentRenderer` - Receipt and quote rendering
//! - `NotificationSink` - Transactional email

mod document_renderer;
mod notification_outbox;
mod notification_sink;
mod payment_capture;
mod registration_repository;
mod session_store;

pub use document_renderer::{DocumentError, DocumentRenderer};
pub use notification_outbox::{
    EnqueueResult, NotificationOutbox, NotificationOutboxEntry, NotificationStatus,
};
pub use notification_sink::{Attachment, Notification, NotificationError, NotificationSink};
pub use payment_capture::{
    CaptureReceipt, CaptureRequest, PaymentCapture, PaymentError, PaymentErrorCode,
};
pub use registration_repository::{QuoteSequence, RegistrationRepository};
pub use session_store::SessionStore;
