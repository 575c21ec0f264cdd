//! Deterministic, model-free embedding provider.
//!
//! [`HashEmbeddingProvider`] projects lower-cased word tokens into a fixed
//! number of buckets with the signed hashing trick and L2-normalises the
//! result. Texts that share words get a positive dot product, which is enough
//! for offline use, demos and tests.

use std::hash::Hasher;

use async_trait::async_trait;
use twox_hash::XxHash64;

use crate::embedding::EmbeddingProvider;
use crate::error::Result;

const SEED: u64 = 0;

/// A hashing-trick embedding provider with no external model.
#[derive(Debug, Clone)]
pub struct HashEmbeddingProvider {
    dimensions: usize,
}

impl HashEmbeddingProvider {
    /// Create a provider producing vectors of `dimensions` entries (at least one).
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions: dimensions.max(1) }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        for token in text.split_whitespace().filter_map(normalize_token) {
            let mut hasher = XxHash64::with_seed(SEED);
            hasher.write(token.as_bytes());
            let hash = hasher.finish();

            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

impl Default for HashEmbeddingProvider {
    fn default() -> Self {
        Self::new(384)
    }
}

fn normalize_token(raw: &str) -> Option<String> {
    let token: String =
        raw.chars().filter(|c| c.is_alphanumeric()).flat_map(char::to_lowercase).collect();
    if token.is_empty() { None } else { Some(token) }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_sync(text)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "hash"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn vectors_are_normalized_and_deterministic() {
        let provider = HashEmbeddingProvider::new(64);
        let a = provider.embed("Rust ownership and borrowing").await.unwrap();
        let b = provider.embed("rust OWNERSHIP, and borrowing!").await.unwrap();

        assert_eq!(a.len(), 64);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "norm was {norm}");
        assert_eq!(a, b, "case and punctuation are ignored");
    }

    #[tokio::test]
    async fn shared_words_score_higher_than_disjoint_words() {
        let provider = HashEmbeddingProvider::new(384);
        let query = provider.embed("memory safety").await.unwrap();
        let related = provider.embed("rust gives memory safety without gc").await.unwrap();
        let unrelated = provider.embed("pandas dataframe plotting").await.unwrap();

        assert!(dot(&query, &related) > dot(&query, &unrelated));
    }

    #[tokio::test]
    async fn empty_text_yields_zero_vector() {
        let provider = HashEmbeddingProvider::new(8);
        let v = provider.embed("  ... ").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
