//! Registration-specific error types.
//!
//! # Error Classification
//!
//! | Error | Code | Retried |
//! |-------|------|---------|
//! | NotFound | REGISTRATION_NOT_FOUND | no |
//! | SessionNotFound | TRAINING_SESSION_NOT_FOUND | no |
//! | SessionFull | SESSION_FULL | no |
//! | SessionClosed | SESSION_CLOSED | no |
//! | PriceUnavailable | PRICE_UNAVAILABLE | no |
//! | InvalidTransition | INVALID_STATE_TRANSITION | no |
//! | ConcurrentModification | CONCURRENT_MODIFICATION | yes |
//! | Unavailable | TIMEOUT | yes |
//! | ValidationFailed | VALIDATION_FAILED | no |
//! | Infrastructure | DATABASE_ERROR | yes |

use crate::domain::foundation::{
    Currency, DomainError, ErrorCode, RegistrationId, TrainingSessionId, ValidationError,
};
use crate::domain::session::CapacityError;

use super::RegistrationStatus;

/// Registration-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// Registration was not found.
    NotFound(RegistrationId),

    /// The requested training session does not exist.
    SessionNotFound(TrainingSessionId),

    /// No seats left.
    SessionFull(TrainingSessionId),

    /// The session stopped accepting registrations.
    SessionClosed(TrainingSessionId),

    /// The session is not sold in the requested currency.
    PriceUnavailable {
        session_id: TrainingSessionId,
        currency: Currency,
    },

    /// The registration is not in a state that allows the operation.
    InvalidTransition {
        current: RegistrationStatus,
        attempted: String,
    },

    /// Another writer committed first.
    ConcurrentModification(String),

    /// A dependency did not answer in time, even after retries.
    Unavailable(String),

    /// Validation failed.
    ValidationFailed { field: String, message: String },

    /// Infrastructure error.
    Infrastructure(String),
}

impl RegistrationError {
    pub fn not_found(id: RegistrationId) -> Self {
        RegistrationError::NotFound(id)
    }

    pub fn price_unavailable(session_id: TrainingSessionId, currency: Currency) -> Self {
        RegistrationError::PriceUnavailable {
            session_id,
            currency,
        }
    }

    pub fn invalid_transition(current: RegistrationStatus, attempted: impl Into<String>) -> Self {
        RegistrationError::InvalidTransition {
            current,
            attempted: attempted.into(),
        }
    }

    pub fn concurrent_modification(message: impl Into<String>) -> Self {
        RegistrationError::ConcurrentModification(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        RegistrationError::Unavailable(message.into())
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        RegistrationError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        RegistrationError::Infrastructure(message.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            RegistrationError::NotFound(_) => ErrorCode::RegistrationNotFound,
            RegistrationError::SessionNotFound(_) => ErrorCode::TrainingSessionNotFound,
            RegistrationError::SessionFull(_) => ErrorCode::SessionFull,
            RegistrationError::SessionClosed(_) => ErrorCode::SessionClosed,
            RegistrationError::PriceUnavailable { .. } => ErrorCode::PriceUnavailable,
            RegistrationError::InvalidTransition { .. } => ErrorCode::InvalidStateTransition,
            RegistrationError::ConcurrentModification(_) => ErrorCode::ConcurrentModification,
            RegistrationError::Unavailable(_) => ErrorCode::Timeout,
            RegistrationError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            RegistrationError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }

    /// Returns a user-friendly error message.
    pub fn message(&self) -> String {
        match self {
            RegistrationError::NotFound(id) => format!("Registration not found: {}", id),
            RegistrationError::SessionNotFound(id) => {
                format!("Training session not found: {}", id)
            }
            RegistrationError::SessionFull(_) => {
                "This session is full. No seats are left.".to_string()
            }
            RegistrationError::SessionClosed(_) => {
                "This session is closed to new registrations.".to_string()
            }
            RegistrationError::PriceUnavailable { currency, .. } => {
                format!("This session cannot be booked in {}", currency)
            }
            RegistrationError::InvalidTransition { current, attempted } => {
                format!("Cannot {} a registration that is {}", attempted, current)
            }
            RegistrationError::ConcurrentModification(msg) => {
                format!("Registration was modified concurrently: {}", msg)
            }
            RegistrationError::Unavailable(msg) => {
                format!("Service temporarily unavailable: {}", msg)
            }
            RegistrationError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            RegistrationError::Infrastructure(msg) => format!("Error: {}", msg),
        }
    }

    /// Returns true if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RegistrationError::ConcurrentModification(_)
                | RegistrationError::Unavailable(_)
                | RegistrationError::Infrastructure(_)
        )
    }
}

impl std::fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for RegistrationError {}

impl From<CapacityError> for RegistrationError {
    fn from(err: CapacityError) -> Self {
        match err {
            CapacityError::NotFound(id) => RegistrationError::SessionNotFound(id),
            CapacityError::SessionFull(id) => RegistrationError::SessionFull(id),
            CapacityError::SessionClosed(id) => RegistrationError::SessionClosed(id),
            CapacityError::Timeout { .. } => RegistrationError::Unavailable(err.message()),
            CapacityError::Infrastructure(msg) => RegistrationError::Infrastructure(msg),
        }
    }
}

impl From<ValidationError> for RegistrationError {
    fn from(err: ValidationError) -> Self {
        RegistrationError::ValidationFailed {
            field: err.field().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<DomainError> for RegistrationError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed => RegistrationError::ValidationFailed {
                field: err
                    .details
                    .get("field")
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
                message: err.message,
            },
            ErrorCode::ConcurrentModification => {
                RegistrationError::ConcurrentModification(err.message)
            }
            ErrorCode::Timeout => RegistrationError::Unavailable(err.message),
            _ => RegistrationError::Infrastructure(err.to_string()),
        }
    }
}

impl From<RegistrationError> for DomainError {
    fn from(err: RegistrationError) -> Self {
        DomainError::new(err.code(), err.message())
    }
}
