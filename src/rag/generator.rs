// Answer generation from filtered evidence
use std::sync::Arc;
use tracing::debug;

use crate::errors::{RagError, Result};
use crate::models::{ChatModel, Prompt};
use crate::rag::context::format_docs;
use crate::types::Passage;

const ANSWER_SYSTEM_PROMPT: &str = "You are an assistant for question-answering tasks. \
Use only the information in the provided documents to answer the question. \
If the documents do not contain enough information, just say that you don't know. \
Use three-to-five sentences maximum and keep the answer concise.";

/// Build the generation prompt for a question and its evidence
pub fn answer_prompt(question: &str, passages: &[Passage]) -> Prompt {
    Prompt::new(
        ANSWER_SYSTEM_PROMPT,
        format!(
            "Retrieved documents: \n\n <docs>{}</docs> \n\n User question: <question>{}</question>",
            format_docs(passages),
            question
        ),
    )
}

/// Generates an answer grounded in the given passages
pub struct AnswerGenerator {
    model: Arc<dyn ChatModel>,
}

impl AnswerGenerator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// One completion, no retries; any failure is a generation error
    pub async fn generate(&self, question: &str, passages: &[Passage]) -> Result<String> {
        let prompt = answer_prompt(question, passages);
        debug!(model = %self.model.describe(), documents = passages.len(), "generating answer");

        let answer = self
            .model
            .complete(&prompt)
            .await
            .map_err(|e| e.into_generation())?;

        let answer = answer.trim();
        if answer.is_empty() {
            return Err(RagError::Generation("Model returned an empty answer".to_string()));
        }

        Ok(answer.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OutputSchema;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Mutex;

    struct EchoModel {
        reply: Option<String>,
        seen: Mutex<Option<Prompt>>,
    }

    #[async_trait]
    impl ChatModel for EchoModel {
        fn describe(&self) -> String {
            "echo".to_string()
        }

        async fn complete(&self, prompt: &Prompt) -> Result<String> {
            *self.seen.lock().unwrap() = Some(prompt.clone());
            self.reply.clone().ok_or_else(|| RagError::Provider {
                provider: "echo".to_string(),
                message: "HTTP 500".to_string(),
            })
        }

        async fn complete_structured(&self, _prompt: &Prompt, _schema: &OutputSchema) -> Result<Value> {
            Ok(Value::Null)
        }
    }

    #[tokio::test]
    async fn test_generate_uses_evidence() {
        let model = Arc::new(EchoModel {
            reply: Some("  Sea levels rise.  ".to_string()),
            seen: Mutex::new(None),
        });
        let generator = AnswerGenerator::new(model.clone());
        let answer = generator
            .generate("Why?", &[Passage::new("p1", "Sea levels rise with warming.")])
            .await
            .unwrap();

        assert_eq!(answer, "Sea levels rise.");
        let prompt = model.seen.lock().unwrap().clone().unwrap();
        assert!(prompt.user.contains("<docs><doc1>:"));
        assert!(prompt.user.contains("<question>Why?</question>"));
        assert!(prompt.system.contains("three-to-five sentences"));
    }

    #[tokio::test]
    async fn test_provider_failure_is_generation_error() {
        let generator = AnswerGenerator::new(Arc::new(EchoModel {
            reply: None,
            seen: Mutex::new(None),
        }));
        let err = generator.generate("Why?", &[]).await.unwrap_err();
        assert!(matches!(err, RagError::Generation(ref m) if m.contains("HTTP 500")));
    }

    #[tokio::test]
    async fn test_empty_answer_is_generation_error() {
        let generator = AnswerGenerator::new(Arc::new(EchoModel {
            reply: Some("   ".to_string()),
            seen: Mutex::new(None),
        }));
        assert!(matches!(
            generator.generate("Why?", &[]).await,
            Err(RagError::Generation(_))
        ));
    }
}
