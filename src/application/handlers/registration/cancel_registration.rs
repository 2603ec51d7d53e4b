//! CancelRegistrationHandler - Learner or administrator cancellation.

use std::sync::Arc;

use crate::domain::foundation::{RegistrationId, Timestamp};
use crate::domain::registration::{CancellationReason, Registration, RegistrationError};

use crate::application::RegistrationLifecycle;

/// Who asked for the cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelledBy {
    Learner,
    Administrator,
}

impl From<CancelledBy> for CancellationReason {
    fn from(by: CancelledBy) -> Self {
        match by {
            CancelledBy::Learner => CancellationReason::LearnerRequested,
            CancelledBy::Administrator => CancellationReason::AdministratorRequested,
        }
    }
}

/// Command to cancel a registration.
#[derive(Debug, Clone)]
pub struct CancelRegistrationCommand {
    pub registration_id: RegistrationId,
    pub requested_by: CancelledBy,
}

/// Handler for cancellations.
pub struct CancelRegistrationHandler {
    lifecycle: Arc<RegistrationLifecycle>,
}

impl CancelRegistrationHandler {
    pub fn new(lifecycle: Arc<RegistrationLifecycle>) -> Self {
        Self { lifecycle }
    }

    /// Cancels the registration and releases its seat.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` for a registration that is already Confirmed or
    /// Cancelled.
    pub async fn handle(
        &self,
        cmd: CancelRegistrationCommand,
    ) -> Result<Registration, RegistrationError> {
        self.lifecycle
            .cancel(
                cmd.registration_id,
                cmd.requested_by.into(),
                Timestamp::now(),
            )
            .await
    }
}
