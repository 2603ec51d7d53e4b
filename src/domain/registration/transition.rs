//! Markers for transitions that carry a user-facing side effect.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::billing::DocumentKind;
use crate::domain::foundation::ValidationError;

/// A transition whose document and notification must fire exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionMarker {
    /// Created -> PendingPayment on the bank-transfer branch.
    QuoteIssued,
    /// PendingPayment -> Confirmed.
    PaymentConfirmed,
    /// Any -> Cancelled.
    RegistrationCancelled,
}

impl TransitionMarker {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionMarker::QuoteIssued => "quote_issued",
            TransitionMarker::PaymentConfirmed => "payment_confirmed",
            TransitionMarker::RegistrationCancelled => "registration_cancelled",
        }
    }

    /// Notification template name.
    pub fn template(&self) -> &'static str {
        self.as_str()
    }

    /// Document attached to the notification, if any.
    pub fn document(&self) -> Option<DocumentKind> {
        match self {
            TransitionMarker::QuoteIssued => Some(DocumentKind::Quote),
            TransitionMarker::PaymentConfirmed => Some(DocumentKind::Receipt),
            TransitionMarker::RegistrationCancelled => None,
        }
    }
}

impl fmt::Display for TransitionMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransitionMarker {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quote_issued" => Ok(TransitionMarker::QuoteIssued),
            "payment_confirmed" => Ok(TransitionMarker::PaymentConfirmed),
            "registration_cancelled" => Ok(TransitionMarker::RegistrationCancelled),
            other => Err(ValidationError::invalid_format(
                "marker",
                format!("unknown transition marker '{}'", other),
            )),
        }
    }
}
