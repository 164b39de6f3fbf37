//! Paragraph block segmentation for each input mode named in §4.1: HTML,
//! Markdown, plain text, PDF, and ZIP/EPUB. Every mode ultimately produces
//! a paragraph list satisfying the normaliser's speakable/trimmed/
//! `MIN_PARAGRAPH_LENGTH` contract.

pub mod epub;
pub mod html;
pub mod pdf;

use crate::normaliser::{paragraphs_from_markdown, paragraphs_from_plain_text};
use crate::ReaderError;

/// Caps matching §3.3/§6.3's size limits, checked before any parsing work.
pub const HTML_SIZE_CAP: usize = 2 * 1024 * 1024;
pub const PDF_SIZE_CAP: usize = 10 * 1024 * 1024;
pub const EPUB_COMPRESSED_CAP: usize = 10 * 1024 * 1024;
pub const EPUB_DECOMPRESSED_CAP: usize = 50 * 1024 * 1024;

/// Extracts paragraphs from raw HTML: block-level extraction via a
/// reader-view-style parser, converted to Markdown, then normalised.
pub fn from_html(raw_html: &str) -> Result<Vec<String>, ReaderError> {
    if raw_html.len() > HTML_SIZE_CAP {
        return Err(ReaderError::TooLarge);
    }
    let markdown = html::blocks_to_markdown(html::extract_blocks(raw_html));
    let paragraphs = paragraphs_from_markdown(&markdown);
    if paragraphs.is_empty() {
        return Err(ReaderError::ParseEmpty);
    }
    Ok(paragraphs)
}

/// Extracts paragraphs from Markdown source directly.
pub fn from_markdown(markdown: &str) -> Result<Vec<String>, ReaderError> {
    let paragraphs = paragraphs_from_markdown(markdown);
    if paragraphs.is_empty() {
        return Err(ReaderError::ParseEmpty);
    }
    Ok(paragraphs)
}

/// Extracts paragraphs from plain text via the three-tier fallback.
pub fn from_plain_text(text: &str) -> Result<Vec<String>, ReaderError> {
    let paragraphs = paragraphs_from_plain_text(text);
    if paragraphs.is_empty() {
        return Err(ReaderError::ParseEmpty);
    }
    Ok(paragraphs)
}

/// Extracts paragraphs from PDF bytes: geometry-gap paragraph breaks,
/// hyphenation joins, and bookmark-derived heading insertion.
pub fn from_pdf(bytes: &[u8]) -> Result<Vec<String>, ReaderError> {
    if bytes.len() > PDF_SIZE_CAP {
        return Err(ReaderError::TooLarge);
    }
    let paragraphs = pdf::extract_paragraphs(bytes)?;
    if paragraphs.is_empty() {
        return Err(ReaderError::ParseEmpty);
    }
    Ok(paragraphs)
}

/// Extracts paragraphs from a ZIP/EPUB container.
pub fn from_epub(bytes: &[u8]) -> Result<Vec<String>, ReaderError> {
    if bytes.len() > EPUB_COMPRESSED_CAP {
        return Err(ReaderError::TooLarge);
    }
    let paragraphs = epub::extract_paragraphs(bytes)?;
    if paragraphs.is_empty() {
        return Err(ReaderError::ParseEmpty);
    }
    Ok(paragraphs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_size_cap_is_rejected_before_parsing() {
        let huge = "x".repeat(HTML_SIZE_CAP + 1);
        assert_eq!(from_html(&huge), Err(ReaderError::TooLarge));
    }

    #[test]
    fn plain_text_empty_after_filtering_is_parse_empty() {
        assert_eq!(from_plain_text("A. B. C."), Err(ReaderError::ParseEmpty));
    }

    #[test]
    fn markdown_with_real_content_extracts_paragraphs() {
        let md = "First paragraph has enough real words to pass filtering easily.\n\nSecond paragraph also has enough real words in it to pass.";
        let paras = from_markdown(md).unwrap();
        assert_eq!(paras.len(), 2);
    }
}
