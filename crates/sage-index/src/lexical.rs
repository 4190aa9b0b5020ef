//! BM25 lexical index, rebuilt from the chunk corpus on every mutation.
//!
//! Incremental term-statistics maintenance is easy to get subtly wrong, so
//! this index trades mutation latency for correctness: each rebuild reindexes
//! the whole corpus, which keeps the lexical document set identical to the
//! semantic one by construction.

use bm25::{Document, Language, SearchEngineBuilder};
use tracing::trace;
use uuid::Uuid;

use sage_core::Chunk;

/// BM25 ranking over the current chunk corpus.
///
/// Documents are addressed by their ordinal position in the corpus slice the
/// index was built from; ordinals stay valid because every rebuild is total.
pub struct LexicalIndex {
    engine: bm25::SearchEngine<u64>,
    ids: Vec<Uuid>,
}

impl LexicalIndex {
    /// Build the index from the complete current corpus.
    pub fn build(chunks: &[Chunk]) -> Self {
        let documents: Vec<Document<u64>> = chunks
            .iter()
            .enumerate()
            .map(|(ordinal, chunk)| Document {
                id: ordinal as u64,
                contents: chunk.text.clone(),
            })
            .collect();

        let engine =
            SearchEngineBuilder::<u64>::with_documents(Language::English, documents).build();

        Self {
            engine,
            ids: chunks.iter().map(|c| c.id).collect(),
        }
    }

    /// The k chunk ids with highest BM25 score, best first. An empty corpus
    /// yields an empty sequence, not an error.
    pub fn query(&self, text: &str, k: usize) -> Vec<Uuid> {
        if self.ids.is_empty() || k == 0 {
            return Vec::new();
        }

        let results = self.engine.search(text, k);
        trace!(result_count = results.len(), "lexical query");

        results
            .into_iter()
            .filter_map(|r| self.ids.get(r.document.id as usize).copied())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
