//! The per-document index: chunk metadata and its row-aligned embedding matrix.

use crate::document::Chunk;
use crate::error::{RagError, Result};

/// Chunks of one document together with one embedding row per chunk.
///
/// Row `i` of the matrix is the embedding of `chunks()[i]`. The constructor
/// enforces that invariant and there are no mutators, so the two sequences
/// can never drift apart.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentIndex {
    dimensions: usize,
    chunks: Vec<Chunk>,
    // Row-major, `chunks.len() * dimensions` entries.
    matrix: Vec<f32>,
}

impl DocumentIndex {
    /// Build an index from chunks and their embeddings.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::CorruptIndex`] if the number of embeddings differs
    /// from the number of chunks, and [`RagError::DimensionMismatch`] if any
    /// embedding does not have `dimensions` entries.
    pub fn new(dimensions: usize, chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Result<Self> {
        if chunks.len() != embeddings.len() {
            return Err(RagError::CorruptIndex(format!(
                "{} chunks but {} embedding rows",
                chunks.len(),
                embeddings.len()
            )));
        }

        let mut matrix = Vec::with_capacity(chunks.len() * dimensions);
        for row in embeddings {
            if row.len() != dimensions {
                return Err(RagError::DimensionMismatch { expected: dimensions, actual: row.len() });
            }
            matrix.extend(row);
        }

        Ok(Self { dimensions, chunks, matrix })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Number of chunks, which is also the number of matrix rows.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// The embedding row for chunk `i`, if it exists.
    pub fn row(&self, i: usize) -> Option<&[f32]> {
        if i >= self.chunks.len() {
            return None;
        }
        let start = i * self.dimensions;
        Some(&self.matrix[start..start + self.dimensions])
    }

    /// Iterate over the embedding rows in chunk order.
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        // chunks_exact panics on zero.
        self.matrix.chunks_exact(self.dimensions.max(1)).take(self.chunks.len())
    }

    /// Dot product of `query` with every row, in chunk order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if `query` has the wrong length.
    pub fn scores(&self, query: &[f32]) -> Result<Vec<f32>> {
        if query.len() != self.dimensions {
            return Err(RagError::DimensionMismatch {
                expected: self.dimensions,
                actual: query.len(),
            });
        }
        Ok(self.rows().map(|row| dot(row, query)).collect())
    }

    /// Split the index back into owned rows, for persistence.
    pub(crate) fn embedding_rows(&self) -> Vec<Vec<f32>> {
        self.rows().map(<[f32]>::to_vec).collect()
    }
}

pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str) -> Chunk {
        Chunk { text: text.to_string(), page: 1, document_name: "a.pdf".to_string() }
    }

    #[test]
    fn rows_stay_aligned_with_chunks() {
        let index = DocumentIndex::new(
            2,
            vec![chunk("first"), chunk("second")],
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
        )
        .unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.row(1), Some(&[0.0, 1.0][..]));
        assert_eq!(index.row(2), None);
        assert_eq!(index.scores(&[0.5, 2.0]).unwrap(), vec![0.5, 2.0]);
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let err = DocumentIndex::new(2, vec![chunk("only")], vec![]).unwrap_err();
        assert!(matches!(err, RagError::CorruptIndex(_)));
    }

    #[test]
    fn wrong_row_width_is_rejected() {
        let err = DocumentIndex::new(3, vec![chunk("x")], vec![vec![1.0, 2.0]]).unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 3, actual: 2 }));
    }

    #[test]
    fn query_width_is_checked() {
        let index = DocumentIndex::new(2, vec![chunk("x")], vec![vec![1.0, 0.0]]).unwrap();
        let err = index.scores(&[1.0, 0.0, 0.0]).unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 2, actual: 3 }));
    }
}
