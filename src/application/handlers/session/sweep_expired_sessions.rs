//! SweepExpiredSessionsHandler - Closes every session whose end time passed.
//!
//! Only the open flag is touched. Registrations on a swept session are left
//! as they are; the hold reaper deals with any that are still pending.

use std::sync::Arc;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::SessionStore;

/// Handler for the periodic session sweep.
pub struct SweepExpiredSessionsHandler {
    store: Arc<dyn SessionStore>,
}

impl SweepExpiredSessionsHandler {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Closes ended sessions as of `now` and returns how many were closed.
    pub async fn handle(&self, now: Timestamp) -> Result<usize, DomainError> {
        let closed = self.store.close_ended(now).await?;
        for session_id in &closed {
            tracing::info!(session_id = %session_id, "Closed ended training session");
        }
        Ok(closed.len())
    }
}
