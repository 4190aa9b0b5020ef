//! Index lifecycle and the hybrid query path.
//!
//! [`IndexService`] owns both indexes behind one lock: mutation (ingestion)
//! takes the write lock for the whole upsert, lexical rebuild, and snapshot
//! write, so a query never observes a half-applied mutation. Queries take
//! the read lock and run in parallel with each other.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{info, instrument};

use sage_core::{Chunk, EmbeddingBackend, Error, RankedChunk, Result, Retriever};

use crate::chunking::{split_text, ChunkerConfig};
use crate::fusion::fuse;
use crate::lexical::LexicalIndex;
use crate::semantic::SemanticIndex;
use crate::snapshot;

struct IndexState {
    semantic: SemanticIndex,
    lexical: LexicalIndex,
}

impl IndexState {
    fn from_corpus(chunks: Vec<Chunk>) -> Self {
        let lexical = LexicalIndex::build(&chunks);
        Self {
            semantic: SemanticIndex::from_chunks(chunks),
            lexical,
        }
    }
}

/// Dual-index search service with a durable snapshot.
///
/// The in-memory state is rehydrated lazily from the snapshot directory on
/// first access; rehydration is idempotent. All callers share one instance
/// rather than ambient global handles.
pub struct IndexService {
    snapshot_dir: PathBuf,
    embedder: Arc<dyn EmbeddingBackend>,
    chunker: ChunkerConfig,
    state: RwLock<Option<IndexState>>,
}

impl IndexService {
    /// Open the service over a snapshot directory. No I/O happens until the
    /// first ingest or query.
    pub fn open(snapshot_dir: impl Into<PathBuf>, embedder: Arc<dyn EmbeddingBackend>) -> Self {
        Self {
            snapshot_dir: snapshot_dir.into(),
            embedder,
            chunker: ChunkerConfig::default(),
            state: RwLock::new(None),
        }
    }

    /// Ingest one document: split into chunks, embed, and index.
    ///
    /// Returns the number of chunks created. Blank documents create none.
    #[instrument(skip(self, text), fields(subsystem = "index", op = "ingest_document"))]
    pub async fn ingest_document(
        &self,
        text: &str,
        metadata: HashMap<String, String>,
    ) -> Result<usize> {
        let pieces = split_text(text, &self.chunker);
        self.ingest_texts(pieces, metadata).await
    }

    /// Ingest pre-formed texts, one chunk per text. Used for tabular record
    /// sentences that are already retrieval-sized.
    #[instrument(skip(self, texts), fields(subsystem = "index", op = "ingest_texts"))]
    pub async fn ingest_texts(
        &self,
        texts: Vec<String>,
        metadata: HashMap<String, String>,
    ) -> Result<usize> {
        let texts: Vec<String> = texts
            .into_iter()
            .filter(|t| !t.trim().is_empty())
            .collect();
        if texts.is_empty() {
            return Ok(0);
        }

        // Embed outside the lock; only the index mutation is serialized.
        let embeddings = self.embedder.embed_texts(&texts).await?;
        if embeddings.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }

        let chunks: Vec<Chunk> = texts
            .into_iter()
            .zip(embeddings)
            .filter_map(|(text, embedding)| Chunk::new(text, metadata.clone(), embedding))
            .collect();
        let created = chunks.len();

        self.ensure_loaded().await?;
        let mut guard = self.state.write().await;
        let state = guard.as_mut().ok_or_else(|| {
            Error::Internal("index state missing after rehydration".to_string())
        })?;

        state.semantic.upsert(chunks);
        // Full rebuild keeps the lexical document set equal to the semantic
        // one after every mutation.
        state.lexical = LexicalIndex::build(state.semantic.chunks());

        // The write must finish before the lock is released, but the file
        // I/O itself belongs on a blocking thread.
        let dir = self.snapshot_dir.clone();
        let corpus = state.semantic.chunks().to_vec();
        tokio::task::spawn_blocking(move || snapshot::write(&dir, &corpus))
            .await
            .map_err(|e| Error::Internal(format!("snapshot task panicked: {e}")))??;

        info!(
            subsystem = "index",
            chunk_count = created,
            corpus_size = state.semantic.len(),
            "ingestion complete"
        );
        Ok(created)
    }

    /// Fused top-k retrieval over both indexes.
    ///
    /// Fails with [`Error::IndexUnavailable`] when the corpus is empty.
    #[instrument(skip(self), fields(subsystem = "index", op = "hybrid_query"))]
    pub async fn hybrid_query(&self, query: &str, k: usize) -> Result<Vec<RankedChunk>> {
        self.ensure_loaded().await?;

        let query_embedding = self.embedder.embed_texts(&[query.to_string()]).await?;
        let query_embedding = query_embedding
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("no embedding returned for query".to_string()))?;

        let guard = self.state.read().await;
        let state = guard
            .as_ref()
            .ok_or_else(|| Error::Internal("index state missing after rehydration".to_string()))?;

        if state.semantic.is_empty() {
            return Err(Error::IndexUnavailable);
        }

        let semantic_ids = state.semantic.query(&query_embedding, k);
        let lexical_ids = state.lexical.query(query, k);
        let fused = fuse(&semantic_ids, &lexical_ids, k);

        let results: Vec<RankedChunk> = fused
            .into_iter()
            .filter_map(|hit| {
                state.semantic.get(hit.chunk_id).map(|chunk| RankedChunk {
                    chunk: chunk.clone(),
                    score: hit.score,
                })
            })
            .collect();

        Ok(results)
    }

    /// Number of chunks currently indexed.
    pub async fn corpus_size(&self) -> Result<usize> {
        self.ensure_loaded().await?;
        let guard = self.state.read().await;
        Ok(guard.as_ref().map(|s| s.semantic.len()).unwrap_or(0))
    }

    /// Rehydrate from the snapshot if no in-memory state exists yet.
    async fn ensure_loaded(&self) -> Result<()> {
        if self.state.read().await.is_some() {
            return Ok(());
        }

        let mut guard = self.state.write().await;
        // Another task may have loaded while we waited for the write lock.
        if guard.is_none() {
            let chunks = snapshot::load(&self.snapshot_dir)?;
            *guard = Some(IndexState::from_corpus(chunks));
        }
        Ok(())
    }
}

#[async_trait]
impl Retriever for IndexService {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RankedChunk>> {
        self.hybrid_query(query, k).await
    }
}
