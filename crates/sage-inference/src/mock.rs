//! Mock inference backend for deterministic testing.
//!
//! Generates deterministic embeddings (word-hash bag vectors, so texts with
//! overlapping vocabulary land near each other) and configurable generation
//! responses. Used by unit tests across the workspace and usable as an
//! offline backend when no Ollama instance is reachable.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use sage_core::{Embedding, EmbeddingBackend, Error, GenerationBackend, InferenceBackend, Result};

#[derive(Clone)]
struct MockConfig {
    dimension: usize,
    fixed_responses: HashMap<String, String>,
    default_response: String,
    latency: Duration,
    fail_generation: Option<String>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            dimension: 16,
            fixed_responses: HashMap::new(),
            default_response: "Mock response".to_string(),
            latency: Duration::ZERO,
            fail_generation: None,
        }
    }
}

/// Mock inference backend for testing.
#[derive(Clone, Default)]
pub struct MockBackend {
    config: Arc<MockConfig>,
    generate_calls: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the embedding dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        Arc::make_mut(&mut self.config).dimension = dimension;
        self
    }

    /// Set the response returned for unmapped prompts.
    pub fn with_fixed_response(mut self, response: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).default_response = response.into();
        self
    }

    /// Add a response for one specific prompt.
    pub fn with_response_mapping(
        mut self,
        prompt: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        Arc::make_mut(&mut self.config)
            .fixed_responses
            .insert(prompt.into(), response.into());
        self
    }

    /// Simulate latency on every operation.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        Arc::make_mut(&mut self.config).latency = latency;
        self
    }

    /// Make every generation call fail with the given message.
    pub fn with_generation_failure(mut self, message: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).fail_generation = Some(message.into());
        self
    }

    /// Prompts passed to `generate`, for assertions.
    pub fn generate_calls(&self) -> Vec<String> {
        self.generate_calls
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default()
    }

    async fn simulate_latency(&self) {
        if !self.config.latency.is_zero() {
            tokio::time::sleep(self.config.latency).await;
        }
    }
}

/// FNV-1a word hashing into a fixed-size bag vector.
fn hash_embed(text: &str, dimension: usize) -> Embedding {
    let mut v = vec![0.0f32; dimension];
    for word in text.to_lowercase().split_whitespace() {
        let mut h: u64 = 0xcbf29ce484222325;
        for b in word.bytes() {
            h ^= b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        v[(h % dimension as u64) as usize] += 1.0;
    }
    v
}

#[async_trait]
impl EmbeddingBackend for MockBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        self.simulate_latency().await;
        Ok(texts
            .iter()
            .map(|t| hash_embed(t, self.config.dimension))
            .collect())
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embed"
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.simulate_latency().await;

        if let Ok(mut calls) = self.generate_calls.lock() {
            calls.push(prompt.to_string());
        }

        if let Some(message) = &self.config.fail_generation {
            return Err(Error::Generation(message.clone()));
        }

        Ok(self
            .config
            .fixed_responses
            .get(prompt)
            .cloned()
            .unwrap_or_else(|| self.config.default_response.clone()))
    }

    fn model_name(&self) -> &str {
        "mock-gen"
    }
}

#[async_trait]
impl InferenceBackend for MockBackend {
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}
