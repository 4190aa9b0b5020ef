//! In-memory semantic index over chunk embeddings.
//!
//! Chunks are held in insertion order; queries rank by cosine distance to
//! the query embedding. Stable sorting keeps equal-distance results in
//! insertion order, which makes repeated queries against an unchanged
//! corpus return identical orderings.

use tracing::trace;
use uuid::Uuid;

use sage_core::{Chunk, Embedding};

/// Insertion-ordered collection of chunks, queryable by embedding distance.
#[derive(Debug, Default)]
pub struct SemanticIndex {
    chunks: Vec<Chunk>,
}

impl SemanticIndex {
    pub fn new() -> Self {
        Self { chunks: Vec::new() }
    }

    pub fn from_chunks(chunks: Vec<Chunk>) -> Self {
        Self { chunks }
    }

    /// Append chunks to the corpus. Every chunk carries its own embedding,
    /// so membership and embedding presence cannot diverge.
    pub fn upsert(&mut self, chunks: Vec<Chunk>) {
        self.chunks.extend(chunks);
    }

    /// The k chunk ids nearest to `query` by cosine distance, best first.
    pub fn query(&self, query: &Embedding, k: usize) -> Vec<Uuid> {
        if k == 0 || self.chunks.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = self
            .chunks
            .iter()
            .enumerate()
            .map(|(pos, chunk)| (pos, cosine_distance(query, &chunk.embedding)))
            .collect();

        // Stable: ties keep insertion order.
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        trace!(result_count = scored.len(), "semantic query");
        scored
            .into_iter()
            .map(|(pos, _)| self.chunks[pos].id)
            .collect()
    }

    pub fn get(&self, id: Uuid) -> Option<&Chunk> {
        self.chunks.iter().find(|c| c.id == id)
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Cosine distance in [0, 2]. Zero-norm vectors are maximally distant so
/// they never outrank a real match.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 2.0;
    }
    1.0 - dot / (norm_a * norm_b)
}
