//! Wire types for the chat and embedding provider APIs
//!
//! Only the fields this crate reads or writes are modelled; unknown
//! response fields are ignored by serde.

use serde::{Deserialize, Serialize};

/// One chat message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

impl WireMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// POST {base}/chat/completions (OpenAI and Groq)
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiChatRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct OpenAiChatResponse {
    #[serde(default)]
    pub choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
pub struct OpenAiChoice {
    pub message: OpenAiChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct OpenAiChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// POST {base}/embeddings
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiEmbeddingRequest {
    pub model: String,
    pub input: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct OpenAiEmbeddingResponse {
    pub data: Vec<OpenAiEmbedding>,
}

#[derive(Debug, Deserialize)]
pub struct OpenAiEmbedding {
    pub index: usize,
    pub embedding: Vec<f32>,
}

/// POST {base}/chat (Cohere v2)
#[derive(Debug, Clone, Serialize)]
pub struct CohereChatRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct CohereChatResponse {
    pub message: CohereResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct CohereResponseMessage {
    #[serde(default)]
    pub content: Vec<CohereContentBlock>,
}

#[derive(Debug, Deserialize)]
pub struct CohereContentBlock {
    #[serde(default)]
    pub text: Option<String>,
}

/// POST {base}/embed (Cohere v2)
#[derive(Debug, Clone, Serialize)]
pub struct CohereEmbedRequest {
    pub model: String,
    pub texts: Vec<String>,
    pub input_type: &'static str,
    pub embedding_types: Vec<&'static str>,
}

#[derive(Debug, Deserialize)]
pub struct CohereEmbedResponse {
    pub embeddings: CohereEmbeddings,
}

#[derive(Debug, Deserialize)]
pub struct CohereEmbeddings {
    #[serde(default)]
    pub float: Vec<Vec<f32>>,
}

impl OpenAiChatResponse {
    /// Text of the first choice, if any
    pub fn into_text(self) -> Option<String> {
        self.choices.into_iter().next().and_then(|c| c.message.content)
    }
}

impl CohereChatResponse {
    /// Concatenated text blocks of the assistant message
    pub fn into_text(self) -> Option<String> {
        let text: String = self
            .message
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_openai_response_text() {
        let raw = json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Sea levels rise."}}]
        });
        let response: OpenAiChatResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(response.into_text().as_deref(), Some("Sea levels rise."));
    }

    #[test]
    fn test_openai_response_without_choices() {
        let response: OpenAiChatResponse = serde_json::from_value(json!({})).unwrap();
        assert!(response.into_text().is_none());
    }

    #[test]
    fn test_cohere_response_text() {
        let raw = json!({
            "id": "c-1",
            "message": {"role": "assistant", "content": [{"type": "text", "text": "{\"binary_score\":\"yes\"}"}]}
        });
        let response: CohereChatResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(response.into_text().as_deref(), Some("{\"binary_score\":\"yes\"}"));
    }

    #[test]
    fn test_embedding_request_skips_missing_dimensions() {
        let request = OpenAiEmbeddingRequest {
            model: "text-embedding-3-small".to_string(),
            input: vec!["hello".to_string()],
            dimensions: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("dimensions").is_none());
    }
}
