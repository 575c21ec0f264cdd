//! Error types for the `pdfqa-rag` crate.

use thiserror::Error;

/// Errors that can occur while ingesting or querying documents.
#[derive(Debug, Error)]
pub enum RagError {
    /// The caller supplied input that is rejected before any processing
    /// (for example a file without a `.pdf` suffix).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A document with the same name is already registered.
    #[error("Document '{0}' already exists")]
    DuplicateName(String),

    /// Extraction, chunking or embedding failed for a single document.
    #[error("Processing failed for '{document}': {message}")]
    ProcessingFailure {
        /// The document being processed.
        document: String,
        /// A description of the failure.
        message: String,
    },

    /// The named document is unknown or its persisted data is missing.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A query resolved to an empty set of candidate documents.
    #[error("No documents found to search in")]
    NoCandidates,

    /// A vector does not have the dimensionality the index was built with.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The expected number of dimensions.
        expected: usize,
        /// The number of dimensions actually found.
        actual: usize,
    },

    /// Persisted index data is internally inconsistent.
    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// PDF text extraction failed.
    #[error("Extraction error: {0}")]
    ExtractionError(String),

    /// Reading or writing a persisted artifact failed.
    #[error("Storage error at {path}: {message}")]
    StorageError {
        /// The artifact path involved.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The operation was cancelled before it completed.
    #[error("Operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// A convenience result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RagError>;
