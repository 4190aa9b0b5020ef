//! Core traits for datasage abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Embedding, Message, RankedChunk};
use crate::router::Mode;

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Backend for generating text embeddings.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for the given texts.
    ///
    /// Returns one embedding vector per input text, in input order.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Expected dimension of the embedding vectors.
    fn dimension(&self) -> usize;

    /// Model name being used.
    fn model_name(&self) -> &str;
}

/// Backend for text generation (LLM).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate a full answer for a prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Model name being used.
    fn model_name(&self) -> &str;
}

/// Combined inference backend supporting both embedding and generation.
#[async_trait]
pub trait InferenceBackend: EmbeddingBackend + GenerationBackend {
    /// Check if the backend is available and responding.
    async fn health_check(&self) -> Result<bool>;
}

// =============================================================================
// RETRIEVAL TRAITS
// =============================================================================

/// Provider of fused top-k retrieval over the ingested corpus.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Retrieve the top-k chunks for a query, ranked by fused score.
    ///
    /// Fails with `Error::IndexUnavailable` when nothing has been ingested.
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RankedChunk>>;
}

// =============================================================================
// LEDGER TRAITS
// =============================================================================

/// Repository for the conversation ledger.
///
/// All reads and writes are owner-scoped: a conversation id paired with the
/// wrong owner behaves exactly like a missing conversation.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Create a conversation for an owner. The title is typically the first
    /// question, truncated.
    async fn create(&self, owner_id: Uuid, title: &str) -> Result<Uuid>;

    /// Append a message and bump the conversation's `updated_at` in the
    /// same transaction.
    async fn append_message(
        &self,
        conversation_id: Uuid,
        owner_id: Uuid,
        role: crate::models::MessageRole,
        content: &str,
        mode: Mode,
        metadata: Option<&str>,
    ) -> Result<Uuid>;

    /// List an owner's conversations, most recently updated first.
    async fn list(&self, owner_id: Uuid) -> Result<Vec<crate::models::ConversationSummary>>;

    /// Fetch a conversation's messages in creation order.
    async fn messages(&self, conversation_id: Uuid, owner_id: Uuid) -> Result<Vec<Message>>;

    /// Delete a conversation and all of its messages atomically.
    async fn delete(&self, conversation_id: Uuid, owner_id: Uuid) -> Result<()>;

    /// Whether an owner has this conversation.
    async fn exists(&self, conversation_id: Uuid, owner_id: Uuid) -> Result<bool>;
}
