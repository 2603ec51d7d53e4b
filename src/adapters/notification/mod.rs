//! Notification delivery - drains the transactional outbox into the sink.

mod outbox_relay;

pub use outbox_relay::{DeliveryStats, NotificationRelay, NotificationRelayConfig};
