//! Document adapters - Implementations of the `DocumentRenderer` port.
//!
//! - `TextDocumentRenderer` - Plain-text receipts and quotes

mod text_renderer;

pub use text_renderer::TextDocumentRenderer;
