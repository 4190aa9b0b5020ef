//! Named design constants shared across datasage crates.
//!
//! All tunables live here so the rest of the codebase never embeds magic
//! numbers. Environment variables may override the runtime ones (see
//! `sage-api`); the fusion weights are deliberately not configurable.

// ─── Chunking ──────────────────────────────────────────────────────────────

/// Maximum chunk size in characters for document ingestion.
pub const CHUNK_SIZE: usize = 1000;

/// Character overlap between adjacent chunks.
pub const CHUNK_OVERLAP: usize = 200;

// ─── Retrieval ─────────────────────────────────────────────────────────────

/// Default number of chunks retrieved for a RAG query.
pub const TOP_K: usize = 3;

/// Weight of the semantic (embedding-distance) ranking in hybrid fusion.
///
/// Fixed by design together with [`LEXICAL_WEIGHT`]; the two must sum to 1.0.
/// Making these per-deployment tunables is an open question — do not change
/// them silently.
pub const SEMANTIC_WEIGHT: f32 = 0.6;

/// Weight of the lexical (BM25) ranking in hybrid fusion.
pub const LEXICAL_WEIGHT: f32 = 0.4;

// ─── Streaming ─────────────────────────────────────────────────────────────

/// Maximum wait between worker events before a stream is failed with
/// `error{"timeout"}`.
pub const STREAM_TIMEOUT_SECS: u64 = 60;

/// Inter-token delay for the synthesized (word-split) token producer.
pub const TOKEN_DELAY_MS: u64 = 50;

/// Capacity of the bounded producer → consumer relay channel.
pub const RELAY_CAPACITY: usize = 32;

// ─── Inference backend ─────────────────────────────────────────────────────

/// Default Ollama base URL.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default embedding model.
pub const EMBED_MODEL: &str = "nomic-embed-text";

/// Default generation model.
pub const GEN_MODEL: &str = "qwen3:8b";

/// Default embedding dimension (nomic-embed-text).
pub const EMBED_DIMENSION: usize = 768;

/// Timeout for embedding requests.
pub const EMBED_TIMEOUT_SECS: u64 = 30;

/// Timeout for generation requests.
pub const GEN_TIMEOUT_SECS: u64 = 120;

// ─── Persistence ───────────────────────────────────────────────────────────

/// Default SQLite URL for the conversation ledger.
pub const DATABASE_URL: &str = "sqlite://data/sage.db?mode=rwc";

/// Default directory for the index snapshot.
pub const SNAPSHOT_DIR: &str = "data/index";
