//! Document renderer port.
//!
//! Turns structured receipt or quote data into bytes. Rendering is a pure
//! function of its input: no lookups, no I/O, same data in, same bytes out.

use thiserror::Error;

use crate::domain::billing::{DocumentData, DocumentKind, RenderedDocument};

/// Port for rendering receipts and quotes.
pub trait DocumentRenderer: Send + Sync {
    /// Render a document of the given kind.
    ///
    /// # Errors
    ///
    /// - `MissingData` if the kind needs a field the data does not carry
    /// - `TemplateError` if rendering itself fails
    fn render(
        &self,
        kind: DocumentKind,
        data: &DocumentData,
    ) -> Result<RenderedDocument, DocumentError>;
}

/// Errors that can occur during document rendering.
#[derive(Debug, Clone, Error)]
pub enum DocumentError {
    /// Template rendering failed.
    #[error("Template rendering failed: {0}")]
    TemplateError(String),

    /// Missing required data for rendering.
    #[error("Missing required data: {field}")]
    MissingData { field: String },
}

impl DocumentError {
    /// Creates a template error.
    pub fn template(message: impl Into<String>) -> Self {
        Self::TemplateError(message.into())
    }

    /// Creates a missing data error.
    pub fn missing_data(field: impl Into<String>) -> Self {
        Self::MissingData {
            field: field.into(),
        }
    }
}
