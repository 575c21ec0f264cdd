//! Configuration for ingestion and retrieval.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Configuration parameters shared by the chunker, the store and the search engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum number of words per chunk.
    pub chunk_size: usize,
    /// Number of chunks each document may contribute before global ranking.
    pub top_k_per_doc: usize,
    /// Number of results returned after merging all documents.
    pub top_k_overall: usize,
    /// Dimensionality every stored embedding must have.
    pub dimensions: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self { chunk_size: 100, top_k_per_doc: 3, top_k_overall: 5, dimensions: 384 }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// The default search options implied by this configuration.
    pub fn search_options(&self) -> SearchOptions {
        SearchOptions { top_k_per_doc: self.top_k_per_doc, top_k_overall: self.top_k_overall }
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in words.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set how many chunks each document contributes to the merge.
    pub fn top_k_per_doc(mut self, k: usize) -> Self {
        self.config.top_k_per_doc = k;
        self
    }

    /// Set how many results a query returns overall.
    pub fn top_k_overall(mut self, k: usize) -> Self {
        self.config.top_k_overall = k;
        self
    }

    /// Set the embedding dimensionality.
    pub fn dimensions(mut self, dimensions: usize) -> Self {
        self.config.dimensions = dimensions;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are usable.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if any of `chunk_size`,
    /// `top_k_per_doc`, `top_k_overall` or `dimensions` is zero.
    pub fn build(self) -> Result<RagConfig> {
        let checks = [
            ("chunk_size", self.config.chunk_size),
            ("top_k_per_doc", self.config.top_k_per_doc),
            ("top_k_overall", self.config.top_k_overall),
            ("dimensions", self.config.dimensions),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(RagError::ConfigError(format!("{name} must be greater than zero")));
            }
        }
        Ok(self.config)
    }
}

/// Per-query ranking limits for the two-stage top-k search.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchOptions {
    /// Chunks kept per document before merging.
    pub top_k_per_doc: usize,
    /// Results kept after the global sort.
    pub top_k_overall: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        RagConfig::default().search_options()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_deployment() {
        let config = RagConfig::builder().build().unwrap();
        assert_eq!(config.chunk_size, 100);
        assert_eq!(config.top_k_per_doc, 3);
        assert_eq!(config.top_k_overall, 5);
        assert_eq!(config.dimensions, 384);
    }

    #[test]
    fn zero_values_are_rejected() {
        let err = RagConfig::builder().chunk_size(0).build().unwrap_err();
        assert!(matches!(err, RagError::ConfigError(msg) if msg.contains("chunk_size")));

        let err = RagConfig::builder().top_k_overall(0).build().unwrap_err();
        assert!(matches!(err, RagError::ConfigError(msg) if msg.contains("top_k_overall")));
    }
}
