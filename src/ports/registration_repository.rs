//! Registration repository port.
//!
//! Defines the contract for persisting and retrieving Registration
//! aggregates.
//!
//! # Design
//!
//! - **Never deletes**: cancelled registrations are kept
//! - **Optimistic locking**: `update` only succeeds against the version the
//!   caller read
//! - **Transactional outbox**: a notification passed to `update` commits in
//!   the same step as the registration row
//!
//! # Example
//!
//! ```ignore
//! let expected = registration.next_version();
//! repo.update(&registration, expected, Some(&entry)).await?;
//! ```

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, RegistrationId, Timestamp};
use crate::domain::registration::Registration;

use super::NotificationOutboxEntry;

/// Repository port for Registration aggregate persistence.
#[async_trait]
pub trait RegistrationRepository: Send + Sync {
    /// Save a new registration.
    async fn insert(&self, registration: &Registration) -> Result<(), DomainError>;

    /// Update an existing registration.
    ///
    /// The stored row must still carry `expected_version`; it is replaced by
    /// `registration.version()`. When `notification` is present it is queued
    /// in the same atomic step. A queued entry that already exists for the
    /// same registration and marker is silently kept.
    ///
    /// # Errors
    ///
    /// - `RegistrationNotFound` if the registration doesn't exist
    /// - `ConcurrentModification` if the version no longer matches
    /// - `DatabaseError` on persistence failure
    async fn update(
        &self,
        registration: &Registration,
        expected_version: u64,
        notification: Option<&NotificationOutboxEntry>,
    ) -> Result<(), DomainError>;

    /// Find a registration by its ID.
    async fn find_by_id(&self, id: RegistrationId) -> Result<Option<Registration>, DomainError>;

    /// Registrations still holding a seat whose last update is before
    /// `cutoff`, oldest first.
    async fn find_stale(
        &self,
        cutoff: Timestamp,
        limit: u32,
    ) -> Result<Vec<RegistrationId>, DomainError>;

    /// Cancelled registrations whose seat still has to be returned,
    /// oldest first.
    async fn find_pending_seat_releases(
        &self,
        limit: u32,
    ) -> Result<Vec<RegistrationId>, DomainError>;
}

/// Allocates quote numbers.
#[async_trait]
pub trait QuoteSequence: Send + Sync {
    /// Next value of the monotonically increasing sequence for `year`,
    /// starting at 1.
    async fn next_value(&self, year: i32) -> Result<u64, DomainError>;
}
