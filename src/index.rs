//! In-memory vector index over passage embeddings.
//!
//! Brute-force cosine similarity over all stored vectors, which is exact
//! and plenty fast for single-document scale. An index is immutable once
//! built; a new upload builds a fresh index and the engine swaps the
//! handle atomically.

use crate::embedding::{cosine_similarity, EmbeddingBackend};
use crate::error::{Error, Result};
use crate::models::{Passage, ScoredPassage};

/// A searchable snapshot of one document's passages and their embeddings.
///
/// Invariant: `passages.len() == vectors.len()`, with `vectors[i]`
/// belonging to `passages[i]`.
pub struct VectorIndex {
    passages: Vec<Passage>,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    /// Embed every passage and construct the index.
    ///
    /// One batched embedding call; any failure aborts the build so no
    /// partial index can exist.
    pub async fn build(
        passages: Vec<Passage>,
        backend: &dyn EmbeddingBackend,
    ) -> Result<VectorIndex> {
        let texts: Vec<String> = passages.iter().map(|p| p.text.clone()).collect();
        let vectors = backend.embed(&texts).await?;

        if vectors.len() != passages.len() {
            return Err(Error::Embedding(format!(
                "backend returned {} vectors for {} passages",
                vectors.len(),
                passages.len()
            )));
        }

        Ok(VectorIndex { passages, vectors })
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// All passages in document order.
    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }

    /// Retrieve the top-`k` passages most similar to `query`.
    ///
    /// Embeds the query once, scores every stored vector by cosine
    /// similarity, and returns at most `k` results sorted by decreasing
    /// score. Ties break on the original sequence index, so ordering is
    /// deterministic.
    pub async fn retrieve(
        &self,
        backend: &dyn EmbeddingBackend,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredPassage>> {
        let query_vec = backend.embed_one(query).await?;
        Ok(self.retrieve_by_vector(&query_vec, k))
    }

    /// Nearest-neighbor search against a pre-computed query vector.
    pub fn retrieve_by_vector(&self, query_vec: &[f32], k: usize) -> Vec<ScoredPassage> {
        let mut scored: Vec<ScoredPassage> = self
            .passages
            .iter()
            .zip(self.vectors.iter())
            .map(|(passage, vec)| ScoredPassage {
                passage: passage.clone(),
                score: cosine_similarity(query_vec, vec),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.passage.seq.cmp(&b.passage.seq))
        });
        scored.truncate(k);
        scored
    }
}
