//! Session store port.
//!
//! The store is the single source of truth for seat counters and the
//! open/closed flag. Every capacity change is one atomic step per session
//! row; there is no store-wide lock.
//!
//! # Atomicity
//!
//! - `try_reserve` checks `is_open`, checks `current < max` and increments
//!   in one indivisible operation
//! - `release` decrements, floored at zero, in one indivisible operation
//! - `close_ended` flips `is_open` using the same per-row primitive, so a
//!   seat is never granted against a session that is concurrently closing

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, Timestamp, TrainingSessionId};
use crate::domain::session::{CapacityError, TrainingSession};

/// Port for training session persistence and seat counting.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a newly scheduled session.
    async fn insert(&self, session: &TrainingSession) -> Result<(), DomainError>;

    /// Load a session snapshot.
    async fn find_by_id(
        &self,
        id: TrainingSessionId,
    ) -> Result<Option<TrainingSession>, DomainError>;

    /// Take one seat if the session is open and not full.
    ///
    /// # Errors
    ///
    /// - `NotFound`, `SessionClosed`, `SessionFull` are definite denials
    /// - `Infrastructure` on store failure
    async fn try_reserve(&self, id: TrainingSessionId) -> Result<(), CapacityError>;

    /// Return one seat. Returns false if the count was already zero.
    async fn release(&self, id: TrainingSessionId) -> Result<bool, CapacityError>;

    /// Close one session. Returns false if it was already closed.
    ///
    /// # Errors
    ///
    /// - `TrainingSessionNotFound` if no such session exists
    async fn close(&self, id: TrainingSessionId, now: Timestamp) -> Result<bool, DomainError>;

    /// Close every open session whose end time is before `now`.
    ///
    /// Returns the ids that were closed by this call.
    async fn close_ended(&self, now: Timestamp) -> Result<Vec<TrainingSessionId>, DomainError>;
}
