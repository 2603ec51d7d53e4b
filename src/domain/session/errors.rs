//! Capacity error types.
//!
//! # Error Classification
//!
//! | Error | User-facing | Retried |
//! |-------|-------------|---------|
//! | NotFound | yes | no |
//! | SessionFull | yes | no |
//! | SessionClosed | yes | no |
//! | Timeout | no | yes |
//! | Infrastructure | no | yes |

use crate::domain::foundation::{DomainError, ErrorCode, TrainingSessionId};

/// Reasons a seat could not be granted or released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapacityError {
    /// No training session exists with this id.
    NotFound(TrainingSessionId),

    /// Every seat is taken.
    SessionFull(TrainingSessionId),

    /// The session no longer accepts registrations.
    SessionClosed(TrainingSessionId),

    /// The store did not answer before the reservation deadline.
    Timeout {
        session_id: TrainingSessionId,
        after_ms: u64,
    },

    /// Store failure.
    Infrastructure(String),
}

impl CapacityError {
    pub fn not_found(id: TrainingSessionId) -> Self {
        CapacityError::NotFound(id)
    }

    pub fn session_full(id: TrainingSessionId) -> Self {
        CapacityError::SessionFull(id)
    }

    pub fn session_closed(id: TrainingSessionId) -> Self {
        CapacityError::SessionClosed(id)
    }

    pub fn timeout(session_id: TrainingSessionId, after_ms: u64) -> Self {
        CapacityError::Timeout {
            session_id,
            after_ms,
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        CapacityError::Infrastructure(message.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            CapacityError::NotFound(_) => ErrorCode::TrainingSessionNotFound,
            CapacityError::SessionFull(_) => ErrorCode::SessionFull,
            CapacityError::SessionClosed(_) => ErrorCode::SessionClosed,
            CapacityError::Timeout { .. } => ErrorCode::Timeout,
            CapacityError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }

    /// Returns a user-friendly error message.
    pub fn message(&self) -> String {
        match self {
            CapacityError::NotFound(id) => format!("Training session not found: {}", id),
            CapacityError::SessionFull(_) => {
                "This session is full. No seats are left.".to_string()
            }
            CapacityError::SessionClosed(_) => {
                "This session is closed to new registrations.".to_string()
            }
            CapacityError::Timeout { after_ms, .. } => {
                format!("Seat reservation timed out after {}ms", after_ms)
            }
            CapacityError::Infrastructure(msg) => format!("Error: {}", msg),
        }
    }

    /// Returns true for transient failures the caller should retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CapacityError::Timeout { .. } | CapacityError::Infrastructure(_)
        )
    }

    /// Returns true when the store gave a definite "no seat" answer.
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            CapacityError::SessionFull(_) | CapacityError::SessionClosed(_)
        )
    }
}

impl std::fmt::Display for CapacityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for CapacityError {}

impl From<DomainError> for CapacityError {
    fn from(err: DomainError) -> Self {
        CapacityError::Infrastructure(err.to_string())
    }
}

impl From<CapacityError> for DomainError {
    fn from(err: CapacityError) -> Self {
        DomainError::new(err.code(), err.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denials_are_not_retryable() {
        let id = TrainingSessionId::new();
        assert!(!CapacityError::session_full(id).is_retryable());
        assert!(!CapacityError::session_closed(id).is_retryable());
        assert!(!CapacityError::not_found(id).is_retryable());
        assert!(CapacityError::session_full(id).is_denial());
    }

    #[test]
    fn timeouts_are_retryable_and_not_denials() {
        let err = CapacityError::timeout(TrainingSessionId::new(), 2000);
        assert!(err.is_retryable());
        assert!(!err.is_denial());
        assert_eq!(err.code(), ErrorCode::Timeout);
    }

    #[test]
    fn full_and_closed_have_distinct_messages() {
        let id = TrainingSessionId::new();
        let full = CapacityError::session_full(id).message();
        let closed = CapacityError::session_closed(id).message();
        assert_ne!(full, closed);
        assert!(full.contains("full"));
        assert!(closed.contains("closed"));
    }

    #[test]
    fn converts_to_domain_error_with_code() {
        let err: DomainError = CapacityError::session_full(TrainingSessionId::new()).into();
        assert_eq!(err.code, ErrorCode::SessionFull);
    }
}
