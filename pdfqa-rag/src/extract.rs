//! Page-by-page text extraction from PDF bytes.

use crate::error::{RagError, Result};

/// Largest PDF accepted for extraction (50MB).
pub const MAX_PDF_SIZE: usize = 50 * 1024 * 1024;

/// Turns a document's raw bytes into the text of each page, in page order.
///
/// Extraction is all-or-nothing: either every page is returned or the whole
/// document is rejected.
pub trait PageExtractor: Send + Sync {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>>;
}

/// A [`PageExtractor`] backed by the `pdf-extract` crate.
#[derive(Debug, Clone)]
pub struct PdfPageExtractor {
    max_size: usize,
}

impl PdfPageExtractor {
    pub fn new() -> Self {
        Self { max_size: MAX_PDF_SIZE }
    }

    /// Override the maximum accepted file size in bytes.
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }
}

impl Default for PdfPageExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PageExtractor for PdfPageExtractor {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>> {
        if bytes.len() > self.max_size {
            return Err(RagError::ExtractionError(format!(
                "file too large ({} bytes, maximum is {})",
                bytes.len(),
                self.max_size
            )));
        }
        if !bytes.starts_with(b"%PDF") {
            return Err(RagError::ExtractionError("missing %PDF header".to_string()));
        }

        pdf_extract::extract_text_from_mem_by_pages(bytes)
            .map_err(|e| RagError::ExtractionError(format!("PDF extraction failed: {e:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bytes_without_pdf_header() {
        let err = PdfPageExtractor::new().extract_pages(b"hello world").unwrap_err();
        assert!(matches!(err, RagError::ExtractionError(msg) if msg.contains("%PDF")));
    }

    #[test]
    fn rejects_oversized_input() {
        let extractor = PdfPageExtractor::new().with_max_size(8);
        let err = extractor.extract_pages(b"%PDF-1.7 and more bytes").unwrap_err();
        assert!(matches!(err, RagError::ExtractionError(msg) if msg.contains("too large")));
    }
}
