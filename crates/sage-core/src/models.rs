//! Core data models for datasage.
//!
//! These types are shared across all datasage crates and represent the
//! domain entities: indexed chunks, ranked retrieval results, streaming
//! events, and the conversation ledger rows.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::router::Mode;

/// An embedding vector. Fixed length within one index.
pub type Embedding = Vec<f32>;

// =============================================================================
// CHUNKS & RETRIEVAL
// =============================================================================

/// A unit of ingested text: the atomic item indexed and retrieved.
///
/// Immutable once stored; owned exclusively by the index layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    /// Non-empty by construction ([`Chunk::new`] rejects blank text).
    pub text: String,
    pub metadata: HashMap<String, String>,
    pub embedding: Embedding,
}

impl Chunk {
    /// Create a chunk with a fresh id. Returns `None` for blank text, which
    /// keeps the "every stored chunk has an embedding entry" invariant
    /// trivially maintainable.
    pub fn new(
        text: impl Into<String>,
        metadata: HashMap<String, String>,
        embedding: Embedding,
    ) -> Option<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return None;
        }
        Some(Self {
            id: Uuid::new_v4(),
            text,
            metadata,
            embedding,
        })
    }
}

/// One entry of a fused ranking: a chunk plus its combined score.
#[derive(Debug, Clone, Serialize)]
pub struct RankedChunk {
    pub chunk: Chunk,
    pub score: f32,
}

// =============================================================================
// STREAMING PROTOCOL
// =============================================================================

/// One event of a streaming answer session.
///
/// Lifecycle per session: exactly one `start`, zero or more `token`, then
/// either `error` followed by `end`, or a bare `end`. `end` is always the
/// final event and is emitted at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Start,
    Token { content: String },
    Error { content: String },
    End,
}

impl StreamEvent {
    pub fn token(content: impl Into<String>) -> Self {
        Self::Token {
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::Error {
            content: content.into(),
        }
    }

    /// Whether consumers may treat the stream as finished.
    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }
}

// =============================================================================
// CONVERSATION LEDGER
// =============================================================================

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A conversation: an ordered exchange owned by exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Conversation {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Conversation list entry with its message count.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: i64,
}

/// One ledger entry. Append-only; ordering is creation-time monotonic
/// within a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub mode: Mode,
    /// Mode-specific payload as raw JSON text (e.g. chart data).
    pub metadata: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_rejects_blank_text() {
        assert!(Chunk::new("", HashMap::new(), vec![0.0]).is_none());
        assert!(Chunk::new("   \n", HashMap::new(), vec![0.0]).is_none());
    }

    #[test]
    fn test_chunk_keeps_text_and_embedding() {
        let chunk = Chunk::new("hello", HashMap::new(), vec![0.1, 0.2]).unwrap();
        assert_eq!(chunk.text, "hello");
        assert_eq!(chunk.embedding, vec![0.1, 0.2]);
    }

    #[test]
    fn test_stream_event_wire_format() {
        let json = serde_json::to_string(&StreamEvent::token("Hi")).unwrap();
        assert_eq!(json, r#"{"type":"token","content":"Hi"}"#);

        let json = serde_json::to_string(&StreamEvent::Start).unwrap();
        assert_eq!(json, r#"{"type":"start"}"#);

        let json = serde_json::to_string(&StreamEvent::End).unwrap();
        assert_eq!(json, r#"{"type":"end"}"#);

        let json = serde_json::to_string(&StreamEvent::error("boom")).unwrap();
        assert_eq!(json, r#"{"type":"error","content":"boom"}"#);
    }

    #[test]
    fn test_stream_event_roundtrip() {
        let event: StreamEvent = serde_json::from_str(r#"{"type":"token","content":" "}"#).unwrap();
        assert_eq!(event, StreamEvent::token(" "));
    }

    #[test]
    fn test_only_end_is_terminal_for_consumers() {
        assert!(StreamEvent::End.is_end());
        assert!(!StreamEvent::Start.is_end());
        assert!(!StreamEvent::token("x").is_end());
        // `error` is always followed by `end`; consumers wait for `end`.
        assert!(!StreamEvent::error("x").is_end());
    }

    #[test]
    fn test_message_role_serialization() {
        assert_eq!(
            serde_json::to_string(&MessageRole::Assistant).unwrap(),
            "\"assistant\""
        );
        assert_eq!(serde_json::to_string(&MessageRole::User).unwrap(), "\"user\"");
    }
}
