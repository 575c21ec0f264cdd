//! Data types for documents, chunks, uploads and retrieval results.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::SearchOptions;
use crate::error::Result;

/// Lifecycle status of a registered document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// The document is reserved and being chunked and embedded.
    Processing,
    /// Chunks and embeddings are stored and the document is searchable.
    Ready,
    /// Processing did not complete; the entry may be replaced by a new upload.
    Error,
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

/// Registry entry for a document, keyed by its display name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentMetadata {
    /// Opaque unique identifier generated at upload.
    pub id: String,
    /// Number of pages extracted from the source PDF.
    pub pages: usize,
    /// Current lifecycle status.
    pub status: DocumentStatus,
}

/// The per-page text of a document, ready for chunking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDocument {
    /// Display name of the document (its original filename).
    pub name: String,
    /// Raw text of each page, in page order.
    pub pages: Vec<String>,
}

/// A page-scoped span of words from a document, the unit of retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// Words of the span joined by single spaces.
    pub text: String,
    /// 1-based page number the span was taken from.
    pub page: usize,
    /// Name of the owning document.
    pub document_name: String,
}

/// A retrieved chunk paired with its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedPassage {
    /// Verbatim chunk text.
    pub text: String,
    /// 1-based page number.
    pub page: usize,
    /// Name of the owning document.
    pub document_name: String,
    /// Dot product between the query vector and the chunk vector.
    pub score: f32,
}

impl RetrievedPassage {
    pub(crate) fn from_chunk(chunk: &Chunk, score: f32) -> Self {
        Self {
            text: chunk.text.clone(),
            page: chunk.page,
            document_name: chunk.document_name.clone(),
            score,
        }
    }
}

/// A file submitted for upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// Original filename; becomes the document's display name.
    pub filename: String,
    /// Raw PDF bytes.
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self { filename: filename.into(), bytes: bytes.into() }
    }
}

/// Summary of a successfully ingested document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadedDocument {
    pub filename: String,
    pub id: String,
    pub pages: usize,
    pub status: DocumentStatus,
}

/// Per-file result of a batch upload.
#[derive(Debug)]
pub struct UploadOutcome {
    /// The filename as submitted.
    pub filename: String,
    /// The ingested document, or the error that rejected this file.
    pub result: Result<UploadedDocument>,
}

/// A retrieval request: free text plus an optional set of target document ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RetrievalQuery {
    /// The question text to embed.
    pub text: String,
    /// Document ids to restrict the search to; empty searches every ready document.
    #[serde(default)]
    pub document_ids: Vec<String>,
    /// Overrides the configured ranking limits for this query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<SearchOptions>,
}

impl RetrievalQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Self::default() }
    }

    /// Restrict the search to the given document ids.
    pub fn with_document_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.document_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Override the ranking limits for this query.
    pub fn with_options(mut self, options: SearchOptions) -> Self {
        self.options = Some(options);
        self
    }
}

/// The outcome of a query: a template-composed text plus the ranked sources.
///
/// `response` is assembled verbatim from `sources`; no answer is generated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalResponse {
    pub response: String,
    pub sources: Vec<RetrievedPassage>,
}
