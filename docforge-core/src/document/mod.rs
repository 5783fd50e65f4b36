//! Markdown to PDF conversion.
//!
//! The source is decoded as UTF-8, parsed with the GFM extension set
//! (see [`blocks::enable_extensions`]) and flowed onto A4 pages with a fixed
//! [`Stylesheet`]. [`markdown_to_html`] renders the same input to a standalone
//! HTML page.

pub mod blocks;
mod html;
mod layout;

pub use blocks::{parse_blocks, Block, Run, RunStyle};
pub use html::markdown_to_html;
pub use layout::{font_for, unsupported_chars, PageWriter, Stylesheet};

use crate::error::{ConversionError, Result};

const BOM: char = '\u{feff}';

/// Decode uploaded bytes as UTF-8 text, dropping a leading byte order mark.
pub fn decode_text(bytes: &[u8]) -> Result<&str> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ConversionError::Decode(format!("file is not valid UTF-8: {e}")))?;
    Ok(text.strip_prefix(BOM).unwrap_or(text))
}

/// Render markdown source to PDF bytes.
pub fn render_pdf(source: &str, stylesheet: &Stylesheet) -> Result<Vec<u8>> {
    let blocks = parse_blocks(source)?;

    let missing = unsupported_chars(source);
    if !missing.is_empty() {
        let sample: String = missing.iter().take(16).collect();
        tracing::warn!(
            count = missing.len(),
            chars = %sample,
            "Characters outside WinAnsi print as '?' with the standard PDF fonts"
        );
    }

    let title = blocks::first_heading(&blocks);
    PageWriter::new(stylesheet).render(&blocks, title.as_deref())
}

/// Decode and render an uploaded markdown document.
pub fn convert_markdown(bytes: &[u8], stylesheet: &Stylesheet) -> Result<Vec<u8>> {
    let source = decode_text(bytes)?;
    tracing::debug!("Converting {} bytes of markdown", source.len());
    render_pdf(source, stylesheet)
}
