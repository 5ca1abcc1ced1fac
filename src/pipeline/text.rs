//! Per-page text extraction.
//!
//! The text layer only feeds the relevance filter, so it is flattened to a
//! single line per page: newlines become spaces and the ends are trimmed.

use super::pdfium::{bind_pdfium, load_document};
use crate::error::ExtractError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Cleaned text keyed by 0-based page index, iterated in ascending order.
pub type PageTexts = BTreeMap<usize, String>;

/// Produces one cleaned text entry per page of a document.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, pdf_path: &Path) -> Result<PageTexts, ExtractError>;
}

/// Replace line breaks with spaces and trim the ends.
pub fn clean_text(text: &str) -> String {
    text.replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
        .trim()
        .to_string()
}

/// [`TextExtractor`] backed by pdfium's text layer.
#[derive(Debug, Clone, Default)]
pub struct PdfiumTextExtractor {
    password: Option<String>,
}

impl PdfiumTextExtractor {
    pub fn new(password: Option<String>) -> Self {
        Self { password }
    }
}

#[async_trait]
impl TextExtractor for PdfiumTextExtractor {
    async fn extract_text(&self, pdf_path: &Path) -> Result<PageTexts, ExtractError> {
        let path = pdf_path.to_path_buf();
        let password = self.password.clone();

        tokio::task::spawn_blocking(move || extract_text_blocking(&path, password.as_deref()))
            .await
            .map_err(|e| ExtractError::Internal(format!("Text extraction task panicked: {e}")))?
    }
}

fn extract_text_blocking(pdf_path: &Path, password: Option<&str>) -> Result<PageTexts, ExtractError> {
    let pdfium = bind_pdfium()?;
    let document = load_document(&pdfium, pdf_path, password)?;

    let mut texts = PageTexts::new();
    for (idx, page) in document.pages().iter().enumerate() {
        let text = page
            .text()
            .map_err(|e| ExtractError::TextExtractionFailed {
                page: idx,
                detail: format!("{e:?}"),
            })?
            .all();
        let cleaned = clean_text(&text);
        debug!("Page {}: {} chars of text", idx, cleaned.len());
        texts.insert(idx, cleaned);
    }

    info!("Extracted text from {} pages", texts.len());
    Ok(texts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_collapses_newlines() {
        assert_eq!(clean_text("  Jane Doe\nAccount 123\n"), "Jane Doe Account 123");
        assert_eq!(clean_text("a\r\nb\rc"), "a b c");
        assert_eq!(clean_text("\n\n"), "");
    }

    #[test]
    fn clean_text_keeps_inner_spacing() {
        // Only line breaks are rewritten; runs of spaces are left alone.
        assert_eq!(clean_text("Total  Value\n$10"), "Total  Value $10");
    }
}
