//! # pdfqa-rag
//!
//! Document ingestion and semantic retrieval over uploaded PDF files.
//!
//! Uploaded PDFs are split into fixed-size word chunks, every chunk is
//! embedded, and the chunks plus their embedding matrix are persisted per
//! document. A query is embedded the same way and matched against the stored
//! matrices with a two-stage top-k search; the best passages are quoted back
//! in a templated response.
//!
//! ## Components
//!
//! - [`Chunker`] / [`WordWindowChunker`]: page-preserving word windows
//! - [`EmbeddingProvider`] / [`HashEmbeddingProvider`]: text → unit vectors
//! - [`DocumentStore`]: registry plus on-disk chunk and matrix artifacts
//! - [`SimilaritySearch`]: per-document shortlist then global merge
//! - [`AnswerComposer`] / [`TemplateComposer`]: passages → response text
//! - [`RetrievalService`]: upload, list, query and delete
//!
//! ## Feature flags
//!
//! - `openai`: [`OpenAIEmbeddingProvider`](openai::OpenAIEmbeddingProvider)

pub mod chunking;
pub mod compose;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod hashing;
pub mod index;
pub mod search;
pub mod service;
pub mod storage;
pub mod store;

#[cfg(feature = "openai")]
pub mod openai;

pub use chunking::{Chunker, WordWindowChunker};
pub use compose::{AnswerComposer, DEFAULT_PREAMBLE, TemplateComposer};
pub use config::{RagConfig, RagConfigBuilder, SearchOptions};
pub use document::{
    Chunk, DocumentMetadata, DocumentStatus, ExtractedDocument, RetrievalQuery, RetrievalResponse,
    RetrievedPassage, UploadFile, UploadOutcome, UploadedDocument,
};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use extract::{MAX_PDF_SIZE, PageExtractor, PdfPageExtractor};
pub use hashing::HashEmbeddingProvider;
pub use index::DocumentIndex;
pub use search::{SimilaritySearch, merge_shortlists, rank_document};
pub use service::{RetrievalService, RetrievalServiceBuilder};
pub use storage::{StorageLayout, check_document_name};
pub use store::DocumentStore;
