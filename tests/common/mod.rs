//! Shared fixtures: scripted models and fixed retrievers
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use fusionrag::errors::{RagError, Result};
use fusionrag::models::{ChatModel, OutputSchema, Prompt};
use fusionrag::rag::{
    FusionWeights, PipelineSettings, RagPipeline, Retriever, KEYWORD_RETRIEVER, VECTOR_RETRIEVER,
};
use fusionrag::types::{Passage, RankedList, SOURCE_KEY, TITLE_KEY};

pub const CLIMATE: &str = "Climate change raises sea levels.";
pub const COFFEE: &str = "Unrelated: coffee brewing methods.";

pub fn climate_passage() -> Passage {
    Passage::new("P1", CLIMATE)
        .with_metadata(TITLE_KEY, "Climate")
        .with_metadata(SOURCE_KEY, "climate.md")
}

pub fn coffee_passage() -> Passage {
    Passage::new("P2", COFFEE)
        .with_metadata(TITLE_KEY, "Coffee")
        .with_metadata(SOURCE_KEY, "coffee.md")
}

/// Returns the same passages for every query and records the queries
pub struct FixedRetriever {
    pub name: &'static str,
    pub passages: Vec<Passage>,
    pub queries: Mutex<Vec<String>>,
}

impl FixedRetriever {
    pub fn new(name: &'static str, passages: Vec<Passage>) -> Self {
        Self {
            name,
            passages,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Retriever for FixedRetriever {
    fn name(&self) -> &str {
        self.name
    }

    async fn retrieve(&self, query: &str, k: usize) -> Result<RankedList> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(RankedList::from_entries(
            self.name,
            self.passages
                .iter()
                .take(k)
                .cloned()
                .enumerate()
                .map(|(i, p)| (p, 1.0 / (i as f64 + 1.0))),
        ))
    }
}

pub fn fixed(name: &'static str, passages: Vec<Passage>) -> Arc<dyn Retriever> {
    Arc::new(FixedRetriever::new(name, passages))
}

/// Chat model whose replies are scripted per prompt
///
/// Query expansion: `paraphrases`, or a provider error when `None`.
/// Relevance: "no" for passages containing any of `irrelevant`, else "yes".
/// Groundedness and highlights: the configured reply, or a provider error
/// when `None`.
pub struct ScriptedModel {
    pub answer: String,
    pub paraphrases: Option<String>,
    pub irrelevant: Vec<&'static str>,
    pub groundedness: Option<Value>,
    pub highlights: Option<Value>,
    pub completions: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            paraphrases: None,
            irrelevant: Vec::new(),
            groundedness: Some(json!({"binary_score": "yes"})),
            highlights: Some(json!({"id": [], "title": [], "source": [], "segment": []})),
            completions: Mutex::new(Vec::new()),
        }
    }

    /// User turns seen by answer generation
    pub fn completions(&self) -> Vec<String> {
        self.completions.lock().unwrap().clone()
    }

    fn scripted<T: Clone>(&self, reply: &Option<T>) -> Result<T> {
        reply.clone().ok_or_else(|| RagError::Provider {
            provider: "scripted".to_string(),
            message: "HTTP 503: unavailable".to_string(),
        })
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn describe(&self) -> String {
        "scripted".to_string()
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        if prompt.user.starts_with("Generate ") {
            return self.scripted(&self.paraphrases);
        }
        self.completions.lock().unwrap().push(prompt.user.clone());
        Ok(self.answer.clone())
    }

    async fn complete_structured(&self, prompt: &Prompt, schema: &OutputSchema) -> Result<Value> {
        match schema.name {
            "binary_score" if prompt.user.contains("LLM generation") => self.scripted(&self.groundedness),
            "binary_score" => {
                let irrelevant = self.irrelevant.iter().any(|marker| prompt.user.contains(marker));
                Ok(json!({"binary_score": if irrelevant { "no" } else { "yes" }}))
            }
            _ => self.scripted(&self.highlights),
        }
    }
}

pub fn settings() -> PipelineSettings {
    PipelineSettings {
        weights: FusionWeights::new([(VECTOR_RETRIEVER, 0.6), (KEYWORD_RETRIEVER, 0.4)]).unwrap(),
        similarity_top_k: 5,
        top_k: 5,
        num_queries: 1,
        hallucination_check: true,
        highlight_segments: true,
        max_concurrent_grades: 4,
    }
}

/// Vector returns [P1, P2], keyword returns [P1]
pub fn climate_retrievers() -> Vec<Arc<dyn Retriever>> {
    vec![
        fixed(VECTOR_RETRIEVER, vec![climate_passage(), coffee_passage()]),
        fixed(KEYWORD_RETRIEVER, vec![climate_passage()]),
    ]
}

pub fn pipeline_with(model: Arc<ScriptedModel>) -> RagPipeline {
    RagPipeline::new(climate_retrievers(), model.clone(), model, settings()).unwrap()
}
