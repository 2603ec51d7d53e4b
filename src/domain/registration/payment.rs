//! Payment method and payment status of a registration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{StateMachine, ValidationError};

/// How the learner pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Synchronous capture through the card gateway.
    Card,
    /// Asynchronous wire transfer against a quote.
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "card" => Ok(PaymentMethod::Card),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            other => Err(ValidationError::invalid_format(
                "payment_method",
                format!("unknown payment method '{}'", other),
            )),
        }
    }
}

/// Where the money stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl StateMachine for PaymentStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use PaymentStatus::*;
        matches!((self, target), (Pending, Completed) | (Pending, Failed))
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use PaymentStatus::*;
        match self {
            Pending => vec![Completed, Failed],
            Completed | Failed => vec![],
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(ValidationError::invalid_format(
                "payment_status",
                format!("unknown payment status '{}'", other),
            )),
        }
    }
}

/// Why a registration ended up Cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationReason {
    /// Card capture declined or failed for good.
    PaymentFailed,
    /// The learner withdrew.
    LearnerRequested,
    /// An administrator withdrew the registration.
    AdministratorRequested,
    /// Idle past the inactivity timeout.
    HoldExpired,
}

impl CancellationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancellationReason::PaymentFailed => "payment_failed",
            CancellationReason::LearnerRequested => "learner_requested",
            CancellationReason::AdministratorRequested => "administrator_requested",
            CancellationReason::HoldExpired => "hold_expired",
        }
    }

    /// Wording used in the cancellation notice.
    pub fn describe(&self) -> &'static str {
        match self {
            CancellationReason::PaymentFailed => "your payment could not be completed",
            CancellationReason::LearnerRequested => "you asked us to cancel it",
            CancellationReason::AdministratorRequested => "it was cancelled by our team",
            CancellationReason::HoldExpired => "payment was not received in time",
        }
    }
}

impl fmt::Display for CancellationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CancellationReason {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "payment_failed" => Ok(CancellationReason::PaymentFailed),
            "learner_requested" => Ok(CancellationReason::LearnerRequested),
            "administrator_requested" => Ok(CancellationReason::AdministratorRequested),
            "hold_expired" => Ok(CancellationReason::HoldExpired),
            other => Err(ValidationError::invalid_format(
                "cancellation_reason",
                format!("unknown cancellation reason '{}'", other),
            )),
        }
    }
}
