//! Plain-text receipt and quote renderer.
//!
//! Builds each document section by section from `DocumentData`. The amounts
//! printed are the ones already computed in the data's `AmountBreakdown`, so
//! a document can never disagree with the registration summary.

use crate::domain::billing::{DocumentData, DocumentKind, RenderedDocument};
use crate::domain::foundation::Money;
use crate::ports::{DocumentError, DocumentRenderer};

const CONTENT_TYPE: &str = "text/plain; charset=utf-8";
const RULE: &str = "----------------------------------------";

/// Text implementation of DocumentRenderer.
#[derive(Debug, Clone, Default)]
pub struct TextDocumentRenderer {
    /// Printed in every document header.
    issuer_name: String,
}

impl TextDocumentRenderer {
    /// Creates a renderer that signs documents as `issuer_name`.
    pub fn new(issuer_name: impl Into<String>) -> Self {
        Self {
            issuer_name: issuer_name.into(),
        }
    }

    fn header(&self, kind: DocumentKind, reference: &str, data: &DocumentData) -> String {
        let mut section = String::new();
        if !self.issuer_name.is_empty() {
            section.push_str(&format!("{}\n", self.issuer_name));
        }
        section.push_str(&format!("{} {}\n", kind.title(), reference));
        section.push_str(&format!("Issued: {}\n", data.issued_at.format_date()));
        section.push_str(RULE);
        section.push_str("\n\n");
        section
    }

    fn learner(&self, data: &DocumentData) -> String {
        let mut section = String::from("Billed to\n");
        section.push_str(&format!("  {}\n", data.learner_name));
        if let Some(company) = &data.learner_company {
            section.push_str(&format!("  {}\n", company));
        }
        section.push_str(&format!("  {}\n\n", data.learner_email));
        section
    }

    fn course(&self, data: &DocumentData) -> String {
        let mut section = String::from("Training\n");
        section.push_str(&format!("  {}\n", data.course_title));
        section.push_str(&format!("  {}\n", data.location));
        section.push_str(&format!(
            "  {} to {}\n\n",
            data.starts_at.format_datetime(),
            data.ends_at.format_datetime()
        ));
        section
    }

    fn amounts(&self, data: &DocumentData) -> String {
        let a = &data.amounts;
        let mut section = String::from("Amounts\n");
        section.push_str(&amount_line("Price excl. VAT", &a.ht));
        section.push_str(&amount_line(&format!("VAT ({})", a.vat_rate), &a.vat));
        section.push_str(&amount_line("Total incl. VAT", &a.ttc));
        section.push('\n');
        section
    }

    fn receipt_footer(&self, data: &DocumentData) -> String {
        let mut section = String::new();
        section.push_str(&format!("Amount paid: {}\n", money(&data.amounts.ttc)));
        if let Some(reference) = &data.payment_reference {
            section.push_str(&format!("Payment reference: {}\n", reference));
        }
        section.push_str("\nThank you for your registration.\n");
        section
    }

    fn quote_footer(&self, data: &DocumentData, reference: &str) -> Result<String, DocumentError> {
        let bank = data
            .bank_details
            .as_ref()
            .ok_or_else(|| DocumentError::missing_data("bank_details"))?;

        let mut section = String::new();
        section.push_str(&format!("Amount due: {}\n\n", money(&data.amounts.ttc)));
        section.push_str("Please pay by bank transfer to\n");
        section.push_str(&format!("  Account holder: {}\n", bank.account_holder));
        section.push_str(&format!("  IBAN: {}\n", bank.iban));
        section.push_str(&format!("  BIC: {}\n", bank.bic));
        section.push_str(&format!("  Transfer reference: {}\n\n", reference));
        section.push_str("Your seat is held until the transfer is received.\n");
        Ok(section)
    }
}

fn money(amount: &Money) -> String {
    format!("{} {}", amount.to_decimal_string(), amount.currency().code())
}

fn amount_line(label: &str, amount: &Money) -> String {
    format!("  {:<24}{:>16}\n", label, money(amount))
}

impl DocumentRenderer for TextDocumentRenderer {
    fn render(
        &self,
        kind: DocumentKind,
        data: &DocumentData,
    ) -> Result<RenderedDocument, DocumentError> {
        let (reference, filename) = match kind {
            DocumentKind::Receipt => {
                let reference = data.registration_id.to_string();
                let filename = format!("receipt-{}.txt", reference);
                (reference, filename)
            }
            DocumentKind::Quote => {
                let quote = data
                    .quote_number
                    .as_ref()
                    .ok_or_else(|| DocumentError::missing_data("quote_number"))?;
                (
                    quote.as_str().to_string(),
                    format!("quote-{}.txt", quote.as_str()),
                )
            }
        };

        let mut body = self.header(kind, &reference, data);
        body.push_str(&self.learner(data));
        body.push_str(&self.course(data));
        body.push_str(&self.amounts(data));
        body.push_str(RULE);
        body.push('\n');
        match kind {
            DocumentKind::Receipt => body.push_str(&self.receipt_footer(data)),
            DocumentKind::Quote => body.push_str(&self.quote_footer(data, &reference)?),
        }

        Ok(RenderedDocument {
            kind,
            filename,
            content_type: CONTENT_TYPE.to_string(),
            bytes: body.into_bytes(),
        })
    }
}
