//! Email adapters - Implementations of the `NotificationSink` port.
//!
//! - `ResendNotificationSink` - Transactional email over the Resend API
//! - `RecordingNotificationSink` - Keeps messages in memory

mod recording_sink;
mod resend_sink;
mod templates;

pub use recording_sink::{RecordingNotificationSink, SentNotification};
pub use resend_sink::{ResendConfig, ResendNotificationSink};
pub use templates::{compose, EmailContent};
