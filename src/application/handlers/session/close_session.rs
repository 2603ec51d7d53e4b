//! CloseSessionHandler - Administrator stops registrations on a session.
//!
//! Closing is one-way. Existing registrations keep their seats; only new
//! reservations are refused.

use std::sync::Arc;

use crate::domain::foundation::{DomainError, Timestamp, TrainingSessionId};
use crate::ports::SessionStore;

/// Command to close a session by hand.
#[derive(Debug, Clone)]
pub struct CloseSessionCommand {
    pub session_id: TrainingSessionId,
}

/// Handler for manual closes.
pub struct CloseSessionHandler {
    store: Arc<dyn SessionStore>,
}

impl CloseSessionHandler {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Returns `true` if this call closed the session, `false` if it was
    /// already closed.
    pub async fn handle(&self, cmd: CloseSessionCommand) -> Result<bool, DomainError> {
        let closed = self.store.close(cmd.session_id, Timestamp::now()).await?;
        if closed {
            tracing::info!(session_id = %cmd.session_id, "Training session closed");
        }
        Ok(closed)
    }
}
