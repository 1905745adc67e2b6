//! HTTP clients for the hosted chat and embedding providers
//!
//! Each request is a single POST with a bearer token. Timeouts are set on
//! the underlying `reqwest` client; a timeout surfaces as
//! [`RagError::Provider`] like any other call failure and is re-tagged by
//! the calling component.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use async_trait::async_trait;

use crate::config::{EmbeddingConfig, LlmConfig, Provider};
use crate::errors::{RagError, Result};
use crate::models::types::{
    CohereChatRequest, CohereChatResponse, CohereEmbedRequest, CohereEmbedResponse,
    OpenAiChatRequest, OpenAiChatResponse, OpenAiEmbeddingRequest, OpenAiEmbeddingResponse,
    WireMessage,
};
use crate::models::{parse_json_reply, ChatModel, EmbeddingModel, OutputSchema, Prompt};

/// Read the API key from the configured or provider-default variable
fn resolve_api_key(provider: Provider, api_key_env: Option<&str>) -> Result<String> {
    let var = api_key_env
        .or_else(|| provider.default_api_key_env())
        .ok_or_else(|| {
            RagError::Configuration(format!("Provider '{}' takes no API key", provider))
        })?;

    std::env::var(var).map_err(|_| {
        RagError::Configuration(format!(
            "Environment variable '{}' is not set (needed by provider '{}')",
            var, provider
        ))
    })
}

fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(RagError::Http)
}

fn provider_error(provider: Provider, message: String) -> RagError {
    RagError::Provider {
        provider: provider.to_string(),
        message,
    }
}

/// POST a JSON body and decode a JSON response
async fn post_json<Req, Resp>(
    client: &Client,
    provider: Provider,
    url: &str,
    api_key: &str,
    body: &Req,
) -> Result<Resp>
where
    Req: Serialize + ?Sized,
    Resp: DeserializeOwned,
{
    let response = client
        .post(url)
        .bearer_auth(api_key)
        .json(body)
        .send()
        .await
        .map_err(|e| provider_error(provider, format!("Failed to send request: {}", e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(provider_error(
            provider,
            format!("HTTP {}: {}", status, error_text),
        ));
    }

    response
        .json::<Resp>()
        .await
        .map_err(|e| provider_error(provider, format!("Failed to parse response: {}", e)))
}

/// Client for OpenAI and OpenAI-compatible (Groq) endpoints
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: Client,
    provider: Provider,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    dimensions: Option<usize>,
}

impl OpenAiCompatClient {
    /// Create a client with an explicit key
    pub fn new(
        provider: Provider,
        model: &str,
        api_key: String,
        base_url: Option<&str>,
        timeout_secs: u64,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout_secs)?,
            provider,
            base_url: base_url
                .unwrap_or_else(|| provider.default_base_url())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model: model.to_string(),
            temperature: 0.0,
            dimensions: None,
        })
    }

    /// Chat client from an `[llms.*]` section
    pub fn for_chat(config: &LlmConfig) -> Result<Self> {
        let api_key = resolve_api_key(config.provider, config.api_key_env.as_deref())?;
        let mut client = Self::new(
            config.provider,
            &config.model,
            api_key,
            config.base_url.as_deref(),
            config.timeout_secs,
        )?;
        client.temperature = config.temperature;
        Ok(client)
    }

    /// Embedding client from the `[embeddings]` section
    pub fn for_embeddings(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = resolve_api_key(config.provider, config.api_key_env.as_deref())?;
        let mut client = Self::new(
            config.provider,
            &config.model,
            api_key,
            config.base_url.as_deref(),
            config.timeout_secs,
        )?;
        client.dimensions = config.dimensions;
        Ok(client)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn chat(&self, messages: Vec<WireMessage>, response_format: Option<Value>) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = OpenAiChatRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            response_format,
        };

        debug!(provider = %self.provider, model = %self.model, "chat completion request");
        let response: OpenAiChatResponse =
            post_json(&self.client, self.provider, &url, &self.api_key, &request).await?;

        response
            .into_text()
            .ok_or_else(|| provider_error(self.provider, "Completion had no content".to_string()))
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatClient {
    fn describe(&self) -> String {
        format!("{}:{}", self.provider, self.model)
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        self.chat(
            vec![WireMessage::system(&prompt.system), WireMessage::user(&prompt.user)],
            None,
        )
        .await
    }

    async fn complete_structured(&self, prompt: &Prompt, schema: &OutputSchema) -> Result<Value> {
        // json_object mode is supported by both OpenAI and Groq
        let system = format!("{}\n\n{}", prompt.system, schema.instructions());
        let text = self
            .chat(
                vec![WireMessage::system(system), WireMessage::user(&prompt.user)],
                Some(json!({ "type": "json_object" })),
            )
            .await?;
        parse_json_reply(self.provider.as_str(), &text)
    }
}

#[async_trait]
impl EmbeddingModel for OpenAiCompatClient {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.base_url);
        let request = OpenAiEmbeddingRequest {
            model: self.model.clone(),
            input: texts.to_vec(),
            dimensions: self.dimensions,
        };

        let response: OpenAiEmbeddingResponse =
            post_json(&self.client, self.provider, &url, &self.api_key, &request).await?;

        let mut data = response.data;
        if data.len() != texts.len() {
            return Err(provider_error(
                self.provider,
                format!("Expected {} embeddings, got {}", texts.len(), data.len()),
            ));
        }
        data.sort_by_key(|item| item.index);
        Ok(data.into_iter().map(|item| item.embedding).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_documents(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| provider_error(self.provider, "No embedding returned".to_string()))
    }
}

/// Client for the Cohere v2 API
#[derive(Debug, Clone)]
pub struct CohereClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl CohereClient {
    /// Create a client with an explicit key
    pub fn new(model: &str, api_key: String, base_url: Option<&str>, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout_secs)?,
            base_url: base_url
                .unwrap_or_else(|| Provider::Cohere.default_base_url())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model: model.to_string(),
            temperature: 0.0,
        })
    }

    pub fn for_chat(config: &LlmConfig) -> Result<Self> {
        let api_key = resolve_api_key(Provider::Cohere, config.api_key_env.as_deref())?;
        let mut client = Self::new(&config.model, api_key, config.base_url.as_deref(), config.timeout_secs)?;
        client.temperature = config.temperature;
        Ok(client)
    }

    pub fn for_embeddings(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = resolve_api_key(Provider::Cohere, config.api_key_env.as_deref())?;
        Self::new(&config.model, api_key, config.base_url.as_deref(), config.timeout_secs)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, prompt: &Prompt, response_format: Option<Value>) -> Result<String> {
        let url = format!("{}/chat", self.base_url);
        let request = CohereChatRequest {
            model: self.model.clone(),
            messages: vec![WireMessage::system(&prompt.system), WireMessage::user(&prompt.user)],
            temperature: self.temperature,
            response_format,
        };

        debug!(provider = "cohere", model = %self.model, "chat request");
        let response: CohereChatResponse =
            post_json(&self.client, Provider::Cohere, &url, &self.api_key, &request).await?;

        response
            .into_text()
            .ok_or_else(|| provider_error(Provider::Cohere, "Reply had no text".to_string()))
    }

    async fn embed(&self, texts: &[String], input_type: &'static str) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embed", self.base_url);
        let request = CohereEmbedRequest {
            model: self.model.clone(),
            texts: texts.to_vec(),
            input_type,
            embedding_types: vec!["float"],
        };

        let response: CohereEmbedResponse =
            post_json(&self.client, Provider::Cohere, &url, &self.api_key, &request).await?;

        let vectors = response.embeddings.float;
        if vectors.len() != texts.len() {
            return Err(provider_error(
                Provider::Cohere,
                format!("Expected {} embeddings, got {}", texts.len(), vectors.len()),
            ));
        }
        Ok(vectors)
    }
}

#[async_trait]
impl ChatModel for CohereClient {
    fn describe(&self) -> String {
        format!("cohere:{}", self.model)
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        self.chat(prompt, None).await
    }

    async fn complete_structured(&self, prompt: &Prompt, schema: &OutputSchema) -> Result<Value> {
        let augmented = Prompt::new(
            format!("{}\n\n{}", prompt.system, schema.instructions()),
            prompt.user.clone(),
        );
        let text = self
            .chat(
                &augmented,
                Some(json!({ "type": "json_object", "json_schema": schema.schema })),
            )
            .await?;
        parse_json_reply(Provider::Cohere.as_str(), &text)
    }
}

#[async_trait]
impl EmbeddingModel for CohereClient {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed(texts, "search_document").await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()], "search_query").await?;
        vectors
            .pop()
            .ok_or_else(|| provider_error(Provider::Cohere, "No embedding returned".to_string()))
    }
}
