//! Two-stage top-k similarity search across documents.
//!
//! Each candidate document is scored on its own and cut down to its
//! `top_k_per_doc` best chunks; the shortlists are then merged, re-sorted and
//! truncated to `top_k_overall`. Every searched document that has chunks gets
//! a place in the merge before the global cut.
//!
//! Ordering is deterministic: within a document ties keep chunk order, and in
//! the merge ties keep candidate order (documents are resolved in name order).

use std::cmp::Ordering;
use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, warn};

use crate::config::SearchOptions;
use crate::document::RetrievedPassage;
use crate::error::{RagError, Result};
use crate::index::DocumentIndex;
use crate::store::DocumentStore;

/// Similarity search over the documents held by a [`DocumentStore`].
#[derive(Debug, Clone, Default)]
pub struct SimilaritySearch {
    options: SearchOptions,
}

impl SimilaritySearch {
    pub fn new(options: SearchOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> SearchOptions {
        self.options
    }

    /// Search `candidates` with the engine's default options.
    pub async fn search(
        &self,
        store: &DocumentStore,
        query: &[f32],
        candidates: &[String],
    ) -> Result<Vec<RetrievedPassage>> {
        self.search_with(store, query, candidates, self.options).await
    }

    /// Search `candidates` with explicit ranking limits.
    ///
    /// Candidates whose data is missing are skipped with a warning. If every
    /// candidate is skipped the result is empty.
    ///
    /// # Errors
    ///
    /// - [`RagError::NoCandidates`] if `candidates` is empty.
    /// - [`RagError::DimensionMismatch`] if `query` does not match a stored matrix.
    pub async fn search_with(
        &self,
        store: &DocumentStore,
        query: &[f32],
        candidates: &[String],
        options: SearchOptions,
    ) -> Result<Vec<RetrievedPassage>> {
        if candidates.is_empty() {
            return Err(RagError::NoCandidates);
        }

        let mut indexes = Vec::with_capacity(candidates.len());
        for name in candidates {
            match store.get_chunks_and_embeddings(name).await {
                Ok(index) => indexes.push((name.clone(), index)),
                Err(RagError::NotFound(reason)) => {
                    warn!(document.name = %name, %reason, "skipping document with missing data");
                }
                Err(e) => return Err(e),
            }
        }

        let query: Arc<[f32]> = Arc::from(query);
        let tasks = indexes.into_iter().map(|(name, index)| {
            let query = Arc::clone(&query);
            async move {
                let task = tokio::task::spawn_blocking(move || {
                    rank_document(&index, &query, options.top_k_per_doc)
                });
                match task.await {
                    Ok(ranked) => ranked,
                    Err(e) => Err(RagError::ProcessingFailure {
                        document: name,
                        message: format!("scoring task failed: {e}"),
                    }),
                }
            }
        });
        let shortlists = try_join_all(tasks).await?;

        let results = merge_shortlists(shortlists, options.top_k_overall);
        debug!(
            candidates = candidates.len(),
            result_count = results.len(),
            "similarity search completed"
        );
        Ok(results)
    }
}

/// Score every chunk of `index` against `query` and keep the best `top_k`.
///
/// Results are ordered by descending score; equal scores keep chunk order.
///
/// # Errors
///
/// Returns [`RagError::DimensionMismatch`] if `query` has the wrong length.
pub fn rank_document(
    index: &DocumentIndex,
    query: &[f32],
    top_k: usize,
) -> Result<Vec<RetrievedPassage>> {
    let scores = index.scores(query)?;

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| by_score_desc(scores[a], scores[b]).then(a.cmp(&b)));
    order.truncate(top_k);

    let chunks = index.chunks();
    Ok(order.into_iter().map(|i| RetrievedPassage::from_chunk(&chunks[i], scores[i])).collect())
}

/// Merge per-document shortlists into one list of at most `top_k` results.
///
/// The sort is stable, so equal scores keep the order in which the
/// shortlists (and their entries) were supplied.
pub fn merge_shortlists(
    shortlists: Vec<Vec<RetrievedPassage>>,
    top_k: usize,
) -> Vec<RetrievedPassage> {
    let mut pool: Vec<RetrievedPassage> = shortlists.into_iter().flatten().collect();
    pool.sort_by(|a, b| by_score_desc(a.score, b.score));
    pool.truncate(top_k);
    pool
}

// NaN sorts last.
fn by_score_desc(a: f32, b: f32) -> Ordering {
    let key = |s: f32| if s.is_nan() { f32::NEG_INFINITY } else { s };
    key(b).total_cmp(&key(a))
}
