//! Billing domain module.
//!
//! Amount arithmetic, quote numbering and the structured data handed to
//! document renderers.
//!
//! # Module Structure
//!
//! - `vat` - VatRate and the HT / VAT / TTC breakdown
//! - `quote` - QuoteNumber reference format
//! - `document` - DocumentKind, DocumentData, RenderedDocument

mod document;
mod quote;
mod vat;

pub use document::{BankTransferDetails, DocumentData, DocumentKind, RenderedDocument};
pub use quote::QuoteNumber;
pub use vat::{AmountBreakdown, VatRate};
