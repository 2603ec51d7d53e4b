//! Payment capture port for card payments.
//!
//! Defines the contract for card gateway integrations (e.g., Stripe).
//! One call charges one amount against one payment token.
//!
//! # Design
//!
//! - **Gateway agnostic**: works with any card processor
//! - **Idempotent**: the same idempotency key never charges twice
//! - **Classified failures**: declines are final, network errors may be retried

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, ErrorCode, Money};

/// Port for card capture.
#[async_trait]
pub trait PaymentCapture: Send + Sync {
    /// Charge the amount against the token.
    ///
    /// Returns the gateway reference on success.
    async fn capture(&self, request: &CaptureRequest) -> Result<CaptureReceipt, PaymentError>;
}

/// A single capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRequest {
    /// Tax-inclusive amount to charge.
    pub amount: Money,

    /// Opaque token produced by the gateway's client-side form.
    pub payment_token: String,

    /// Stable key so retries never double-charge.
    pub idempotency_key: String,

    /// Statement description.
    pub description: String,

    /// Where the gateway may send its own receipt.
    pub receipt_email: Option<String>,
}

/// Successful capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureReceipt {
    /// Gateway reference for the charge.
    pub reference: String,
}

/// Errors from payment capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentError {
    /// Error code for categorization.
    pub code: PaymentErrorCode,

    /// Human-readable message.
    pub message: String,

    /// Gateway's own error code (if available).
    pub provider_code: Option<String>,

    /// Whether the operation can be retried.
    pub retryable: bool,
}

impl PaymentError {
    /// Create a new payment error.
    pub fn new(code: PaymentErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
            retryable: code.is_retryable(),
        }
    }

    /// Attach the gateway's error code.
    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::NetworkError, message)
    }

    /// Create a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::Timeout, message)
    }

    /// Create an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::AuthenticationError, message)
    }

    /// Create a card declined error.
    pub fn card_declined(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::CardDeclined, message)
    }

    /// Create a provider error.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::ProviderError, message)
    }

    /// True when the card itself was refused.
    pub fn is_decline(&self) -> bool {
        self.code.is_decline()
    }
}

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PaymentError {}

impl From<PaymentError> for DomainError {
    fn from(err: PaymentError) -> Self {
        let code = match err.code {
            c if c.is_decline() => ErrorCode::PaymentDeclined,
            PaymentErrorCode::Timeout => ErrorCode::Timeout,
            _ => ErrorCode::ExternalServiceError,
        };

        DomainError::new(code, err.message)
    }
}

/// Payment error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentErrorCode {
    /// Network connectivity issue.
    NetworkError,

    /// The gateway did not answer in time.
    Timeout,

    /// API authentication failed.
    AuthenticationError,

    /// Card was declined.
    CardDeclined,

    /// Insufficient funds.
    InsufficientFunds,

    /// Card expired.
    CardExpired,

    /// Invalid card details.
    InvalidCard,

    /// Rate limit exceeded.
    RateLimitExceeded,

    /// Gateway API error.
    ProviderError,

    /// Unknown error.
    Unknown,
}

impl PaymentErrorCode {
    /// Check if this error type is typically retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentErrorCode::NetworkError
                | PaymentErrorCode::Timeout
                | PaymentErrorCode::RateLimitExceeded
        )
    }

    /// Check if the card was refused.
    pub fn is_decline(&self) -> bool {
        matches!(
            self,
            PaymentErrorCode::CardDeclined
                | PaymentErrorCode::InsufficientFunds
                | PaymentErrorCode::CardExpired
                | PaymentErrorCode::InvalidCard
        )
    }
}

impl std::fmt::Display for PaymentErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentErrorCode::NetworkError => "network_error",
            PaymentErrorCode::Timeout => "timeout",
            PaymentErrorCode::AuthenticationError => "authentication_error",
            PaymentErrorCode::CardDeclined => "card_declined",
            PaymentErrorCode::InsufficientFunds => "insufficient_funds",
            PaymentErrorCode::CardExpired => "card_expired",
            PaymentErrorCode::InvalidCard => "invalid_card",
            PaymentErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            PaymentErrorCode::ProviderError => "provider_error",
            PaymentErrorCode::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}
