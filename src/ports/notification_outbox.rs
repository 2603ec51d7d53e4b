//! Notification outbox port.
//!
//! Notifications are written to the outbox in the same atomic step that
//! commits the transition they describe. A background relay delivers them
//! afterwards, so a slow or failing sink can never roll a transition back.
//!
//! ## Pattern Overview
//!
//! 1. The registration write and its outbox entry commit together
//! 2. The relay claims due entries and hands them to the notification sink
//! 3. Delivered entries are marked; failures are rescheduled with backoff
//! 4. Entries past the attempt limit are dead-lettered
//!
//! Entries are unique on `(registration_id, marker)`, so a transition can
//! never queue its notification twice.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, RegistrationId, Timestamp, ValidationError};
use crate::domain::registration::TransitionMarker;

use super::Notification;

/// Status of an outbox entry in the delivery pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    /// Waiting for (re)delivery.
    Pending,
    /// Accepted by the sink.
    Delivered,
    /// Gave up after the attempt limit or a permanent rejection.
    Dead,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Delivered => "delivered",
            NotificationStatus::Dead => "dead",
        }
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(NotificationStatus::Pending),
            "delivered" => Ok(NotificationStatus::Delivered),
            "dead" => Ok(NotificationStatus::Dead),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown notification status '{}'", other),
            )),
        }
    }
}

/// An entry in the notification outbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationOutboxEntry {
    pub id: Uuid,
    pub registration_id: RegistrationId,
    pub marker: TransitionMarker,
    pub notification: Notification,
    pub status: NotificationStatus,
    pub attempts: u32,
    pub next_attempt_at: Timestamp,
    pub last_error: Option<String>,
    pub created_at: Timestamp,
    pub delivered_at: Option<Timestamp>,
}

impl NotificationOutboxEntry {
    /// Create a new pending entry, due immediately.
    pub fn new(
        registration_id: RegistrationId,
        marker: TransitionMarker,
        notification: Notification,
        now: Timestamp,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            registration_id,
            marker,
            notification,
            status: NotificationStatus::Pending,
            attempts: 0,
            next_attempt_at: now,
            last_error: None,
            created_at: now,
            delivered_at: None,
        }
    }

    /// Key the sink can use to drop a redelivered message.
    pub fn idempotency_key(&self) -> String {
        format!("{}-{}", self.registration_id, self.marker)
    }
}

/// Result of an enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueResult {
    /// The entry was stored.
    Inserted,
    /// An entry for the same registration and marker already exists.
    Duplicate,
}

/// Port for the notification outbox.
#[async_trait]
pub trait NotificationOutbox: Send + Sync {
    /// Store an entry unless one exists for the same registration and marker.
    async fn enqueue(&self, entry: &NotificationOutboxEntry) -> Result<EnqueueResult, DomainError>;

    /// Claim up to `limit` pending entries due at `now`.
    ///
    /// Claimed entries are leased until `now + lease_secs` so that a second
    /// relay does not pick them up while they are in flight.
    async fn claim_due(
        &self,
        now: Timestamp,
        lease_secs: u64,
        limit: u32,
    ) -> Result<Vec<NotificationOutboxEntry>, DomainError>;

    /// Mark an entry delivered.
    async fn mark_delivered(&self, id: Uuid, attempts: u32, at: Timestamp)
        -> Result<(), DomainError>;

    /// Record a failed attempt and when to try again.
    async fn schedule_retry(
        &self,
        id: Uuid,
        attempts: u32,
        next_attempt_at: Timestamp,
        error: &str,
    ) -> Result<(), DomainError>;

    /// Give up on an entry.
    async fn mark_dead(&self, id: Uuid, attempts: u32, error: &str) -> Result<(), DomainError>;

    /// All entries queued for a registration, oldest first.
    async fn find_by_registration(
        &self,
        registration_id: RegistrationId,
    ) -> Result<Vec<NotificationOutboxEntry>, DomainError>;
}
