//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`WordWindowChunker`], which
//! splits each page into consecutive, non-overlapping runs of words.

use crate::document::{Chunk, ExtractedDocument};

/// A strategy for splitting an extracted document into chunks.
///
/// Implementations produce chunks in page order, then intra-page order. That
/// order is the one the embedding matrix rows follow.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if every page is empty.
    fn chunk(&self, document: &ExtractedDocument) -> Vec<Chunk>;
}

/// Splits every page into groups of at most `chunk_size` whitespace-separated words.
///
/// The last group of a page may be shorter. Chunks never span a page boundary
/// and pages with no words contribute nothing.
///
/// # Example
///
/// ```rust,ignore
/// use pdfqa_rag::WordWindowChunker;
///
/// let chunker = WordWindowChunker::new(100);
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct WordWindowChunker {
    chunk_size: usize,
}

impl WordWindowChunker {
    /// Create a new `WordWindowChunker`.
    ///
    /// A `chunk_size` of zero is treated as one.
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size: chunk_size.max(1) }
    }

    /// The maximum number of words per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl Default for WordWindowChunker {
    fn default() -> Self {
        Self::new(100)
    }
}

impl Chunker for WordWindowChunker {
    fn chunk(&self, document: &ExtractedDocument) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for (page_index, page_text) in document.pages.iter().enumerate() {
            let words: Vec<&str> = page_text.split_whitespace().collect();
            for group in words.chunks(self.chunk_size) {
                chunks.push(Chunk {
                    text: group.join(" "),
                    page: page_index + 1,
                    document_name: document.name.clone(),
                });
            }
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(pages: &[&str]) -> ExtractedDocument {
        ExtractedDocument {
            name: "manual.pdf".to_string(),
            pages: pages.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn groups_words_per_page() {
        let chunker = WordWindowChunker::new(2);
        let chunks = chunker.chunk(&document(&["a b c", "d  e\n"]));

        let texts: Vec<_> = chunks.iter().map(|c| (c.text.as_str(), c.page)).collect();
        assert_eq!(texts, vec![("a b", 1), ("c", 1), ("d e", 2)]);
        assert!(chunks.iter().all(|c| c.document_name == "manual.pdf"));
    }

    #[test]
    fn empty_pages_produce_no_chunks() {
        let chunker = WordWindowChunker::new(5);
        let chunks = chunker.chunk(&document(&["", "  \n\t", "only"]));

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].page, 3);
    }

    #[test]
    fn zero_chunk_size_is_clamped() {
        let chunker = WordWindowChunker::new(0);
        assert_eq!(chunker.chunk_size(), 1);
        assert_eq!(chunker.chunk(&document(&["x y"])).len(), 2);
    }
}
