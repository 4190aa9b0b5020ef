//! Structured logging schema and field name constants for datasage.
//!
//! All crates use these constants for consistent structured logging fields
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data (ranked hits, tokens) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated across request → stream → sub-calls.
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "index", "stream", "ledger", "inference"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "fusion", "lexical", "semantic", "ollama", "relay"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "retrieve", "ingest", "embed_texts", "stream_answer"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Conversation UUID being operated on.
pub const CONVERSATION_ID: &str = "conversation_id";

/// Owner UUID of the conversation or request.
pub const OWNER_ID: &str = "owner_id";

/// Search query text.
pub const QUERY: &str = "query";

/// Query mode selected by the router.
pub const MODE: &str = "mode";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a retrieval.
pub const RESULT_COUNT: &str = "result_count";

/// Number of chunks processed (ingestion, embedding).
pub const CHUNK_COUNT: &str = "chunk_count";

/// Number of tokens relayed on a stream.
pub const TOKEN_COUNT: &str = "token_count";

// ─── Retrieval-specific fields ─────────────────────────────────────────────

/// Number of lexical (BM25) results before fusion.
pub const LEXICAL_HITS: &str = "lexical_hits";

/// Number of semantic results before fusion.
pub const SEMANTIC_HITS: &str = "semantic_hits";

/// Semantic weight used in hybrid fusion.
pub const SEMANTIC_WEIGHT: &str = "semantic_weight";

/// Lexical weight used in hybrid fusion.
pub const LEXICAL_WEIGHT: &str = "lexical_weight";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for inference.
pub const MODEL: &str = "model";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
