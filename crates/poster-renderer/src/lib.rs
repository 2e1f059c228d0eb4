//! Markdown to Confluence storage format conversion.
//!
//! This crate turns CommonMark/GFM documents into Confluence XHTML storage
//! format. Constructs without a plain XHTML equivalent are emitted as
//! `ac:structured-macro` blocks:
//!
//! - fenced and indented code blocks become the `code` macro
//! - blockquotes become `info`, `note`, `warning` or `tip` panels, chosen by a
//!   leading `Note:` / `Warning:` / `Tip:` / `Info:` keyword or a GFM alert
//! - `~? … ?~`, `~! … !~` and `~% … %~` paragraphs become panels
//! - doctoc blocks become the `toc` macro
//!
//! Conversion never fails. Malformed input (an unterminated code fence, raw
//! HTML) degrades to escaped literal text, and the output is always a
//! well-formed XML fragment. Identical input yields byte-identical output.
//!
//! # Example
//!
//! ```
//! let body = poster_renderer::convert("# Hello\n\n```rust\nfn main() {}\n```");
//! assert!(body.as_str().contains(r#"<ac:parameter ac:name="language">rust</ac:parameter>"#));
//! ```

mod admonition;
mod content;
mod converter;
mod document;
mod html;
mod preprocess;
mod renderer;
mod state;
mod storage;

pub use admonition::PanelKind;
pub use content::StorageContent;
pub use converter::{Converter, ConverterOptions, DEFAULT_CODE_THEME};
pub use document::{DocumentError, ProcessedDocument, discover};
pub use storage::escape_xml;

/// Convert markdown with default options.
///
/// See [`Converter::convert`].
#[must_use]
pub fn convert(source: &str) -> StorageContent {
    Converter::default().convert(source)
}

/// Convert an HTML document with default options.
///
/// See [`Converter::convert_html`].
#[must_use]
pub fn convert_html(source: &str) -> StorageContent {
    Converter::default().convert_html(source)
}
