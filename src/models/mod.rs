//! Chat and embedding model providers
//!
//! The pipeline only sees the [`ChatModel`] and [`EmbeddingModel`] traits.
//! Concrete clients are picked once at startup from the configured
//! [`Provider`] tag:
//! - `openai` / `groq`: OpenAI-compatible chat completions (+ embeddings for OpenAI)
//! - `cohere`: Cohere v2 chat and embed
//! - `hashing`: local deterministic embeddings, no network

pub mod client;
pub mod hashing;
pub mod types;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::config::{EmbeddingConfig, LlmConfig, Provider};
use crate::errors::{RagError, Result};

// Re-export key types for convenience
pub use client::{CohereClient, OpenAiCompatClient};
pub use hashing::HashingEmbedder;

/// A system instruction plus the user turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// JSON schema a structured completion must follow
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    pub name: &'static str,
    pub schema: Value,
}

impl OutputSchema {
    pub fn new(name: &'static str, schema: Value) -> Self {
        Self { name, schema }
    }

    /// Format instructions appended to the system prompt
    pub fn instructions(&self) -> String {
        format!(
            "Respond only with a JSON object that conforms to this JSON schema, without prose or markdown:\n{}",
            self.schema
        )
    }
}

/// Capability set of a chat model
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Provider and model, for logs
    fn describe(&self) -> String;

    /// Free-text completion
    async fn complete(&self, prompt: &Prompt) -> Result<String>;

    /// Completion parsed as a JSON object following `schema`
    async fn complete_structured(&self, prompt: &Prompt, schema: &OutputSchema) -> Result<Value>;
}

/// Capability set of an embedding model
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Embed corpus passages at ingestion time
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a search query
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
}

/// Build the chat model selected by `config.provider`
pub fn build_chat_model(config: &LlmConfig) -> Result<Arc<dyn ChatModel>> {
    match config.provider {
        Provider::OpenAi | Provider::Groq => Ok(Arc::new(OpenAiCompatClient::for_chat(config)?)),
        Provider::Cohere => Ok(Arc::new(CohereClient::for_chat(config)?)),
        Provider::Hashing => Err(RagError::Configuration(
            "The hashing provider cannot serve chat completions".to_string(),
        )),
    }
}

/// Build the embedding model selected by `config.provider`
pub fn build_embedding_model(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingModel>> {
    match config.provider {
        Provider::OpenAi => Ok(Arc::new(OpenAiCompatClient::for_embeddings(config)?)),
        Provider::Cohere => Ok(Arc::new(CohereClient::for_embeddings(config)?)),
        Provider::Hashing => Ok(Arc::new(HashingEmbedder::new(
            config.dimensions.unwrap_or(hashing::DEFAULT_DIMENSIONS),
        ))),
        Provider::Groq => Err(RagError::Configuration(
            "Groq does not offer an embeddings endpoint".to_string(),
        )),
    }
}

/// Extract the JSON object from a model reply, tolerating markdown fences
pub fn parse_json_reply(provider: &str, text: &str) -> Result<Value> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let candidate = match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => &unfenced[start..=end],
        _ => unfenced,
    };

    serde_json::from_str(candidate).map_err(|e| RagError::Provider {
        provider: provider.to_string(),
        message: format!("Reply was not a JSON object: {}", e),
    })
}
