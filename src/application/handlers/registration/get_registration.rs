//! GetRegistrationHandler - Query handler for the in-app registration summary.
//!
//! The amounts come from the same billing policy that fills the quote and
//! receipt, so the figures a learner sees on screen always match the
//! document they receive.

use std::sync::Arc;

use crate::domain::billing::AmountBreakdown;
use crate::domain::foundation::{RegistrationId, Timestamp};
use crate::domain::registration::{Registration, RegistrationError};

use crate::application::RegistrationLifecycle;

/// Query to get a registration by ID.
#[derive(Debug, Clone)]
pub struct GetRegistrationQuery {
    pub registration_id: RegistrationId,
}

/// A registration with the session facts and amounts shown to the learner.
#[derive(Debug, Clone)]
pub struct RegistrationSummary {
    pub registration: Registration,
    pub course_title: String,
    pub location: String,
    pub starts_at: Timestamp,
    pub ends_at: Timestamp,
    pub amounts: AmountBreakdown,
}

/// Handler for reading one registration.
pub struct GetRegistrationHandler {
    lifecycle: Arc<RegistrationLifecycle>,
}

impl GetRegistrationHandler {
    pub fn new(lifecycle: Arc<RegistrationLifecycle>) -> Self {
        Self { lifecycle }
    }

    pub async fn handle(
        &self,
        query: GetRegistrationQuery,
    ) -> Result<RegistrationSummary, RegistrationError> {
        let (registration, session) = self.lifecycle.load(query.registration_id).await?;
        let amounts = self.lifecycle.amounts(&session, &registration)?;

        Ok(RegistrationSummary {
            registration,
            course_title: session.course_title().to_string(),
            location: session.location().to_string(),
            starts_at: session.starts_at(),
            ends_at: session.ends_at(),
            amounts,
        })
    }
}
