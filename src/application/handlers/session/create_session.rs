//! CreateSessionHandler - Command handler for scheduling training sessions.

use std::sync::Arc;

use crate::domain::foundation::{DomainError, Timestamp, TrainingSessionId};
use crate::domain::session::{SessionDetails, TrainingSession};
use crate::ports::SessionStore;

/// Command to schedule a new session.
#[derive(Debug, Clone)]
pub struct CreateSessionCommand {
    pub details: SessionDetails,
}

/// Result of successful session creation.
#[derive(Debug, Clone)]
pub struct CreateSessionResult {
    pub session: TrainingSession,
}

/// Handler for creating sessions.
pub struct CreateSessionHandler {
    store: Arc<dyn SessionStore>,
}

impl CreateSessionHandler {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub async fn handle(&self, cmd: CreateSessionCommand) -> Result<CreateSessionResult, DomainError> {
        // 1. Validate and build the aggregate
        let session = TrainingSession::create(TrainingSessionId::new(), cmd.details, Timestamp::now())?;

        // 2. Persist
        self.store.insert(&session).await?;

        tracing::info!(
            session_id = %session.id(),
            course_title = %session.course_title(),
            max_participants = session.max_participants(),
            "Training session scheduled"
        );
        Ok(CreateSessionResult { session })
    }
}
