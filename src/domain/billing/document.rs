//! Structured input for receipt and quote documents.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{RegistrationId, Timestamp};

use super::{AmountBreakdown, QuoteNumber};

/// Which document is being produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Issued once a registration is confirmed.
    Receipt,
    /// Issued on the bank-transfer branch before payment.
    Quote,
}

impl DocumentKind {
    pub fn title(&self) -> &'static str {
        match self {
            DocumentKind::Receipt => "RECEIPT",
            DocumentKind::Quote => "QUOTE",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Receipt => f.write_str("receipt"),
            DocumentKind::Quote => f.write_str("quote"),
        }
    }
}

/// Where a bank transfer must be sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankTransferDetails {
    pub account_holder: String,
    pub iban: String,
    pub bic: String,
}

/// Everything a renderer needs; renderers do no lookups of their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentData {
    pub registration_id: RegistrationId,
    pub learner_name: String,
    pub learner_email: String,
    pub learner_company: Option<String>,
    pub course_title: String,
    pub location: String,
    pub starts_at: Timestamp,
    pub ends_at: Timestamp,
    pub amounts: AmountBreakdown,
    pub quote_number: Option<QuoteNumber>,
    pub payment_reference: Option<String>,
    pub bank_details: Option<BankTransferDetails>,
    pub issued_at: Timestamp,
}

/// Output of a renderer, ready to attach to a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedDocument {
    pub kind: DocumentKind,
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}
