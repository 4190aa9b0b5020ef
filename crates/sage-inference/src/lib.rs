//! # sage-inference
//!
//! Inference backends and the streaming answer pipeline for datasage:
//! the Ollama HTTP backend, a deterministic mock backend, RAG prompt
//! construction, and the producer/consumer streaming coordinator.

pub mod mock;
pub mod ollama;
pub mod rag;
pub mod stream;

pub use mock::MockBackend;
pub use ollama::OllamaBackend;
pub use rag::build_prompt;
pub use stream::{
    StreamConfig, StreamCoordinator, SynthesizedTokenProducer, TokenProducer, TokenSink,
};
