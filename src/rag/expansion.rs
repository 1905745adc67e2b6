// Query expansion: LLM-generated paraphrases for multi-query fusion
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::{RagError, Result};
use crate::models::{ChatModel, Prompt};

/// Leading `1.`, `2)`, `-` or `*` list marker
const LIST_MARKER: &str = r"^\s*(?:\d+[.)]|[-*])\s+";

const EXPANSION_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that generates multiple search queries based on a single input query.";

/// Generates `num_queries - 1` paraphrases of the question
pub struct QueryExpander {
    model: Arc<dyn ChatModel>,
    num_queries: usize,
    marker: Regex,
}

impl QueryExpander {
    pub fn new(model: Arc<dyn ChatModel>, num_queries: usize) -> Result<Self> {
        let marker = Regex::new(LIST_MARKER)
            .map_err(|e| RagError::Configuration(format!("Invalid list marker pattern: {}", e)))?;

        Ok(Self {
            model,
            num_queries: num_queries.max(1),
            marker,
        })
    }

    /// Whether any extra query would be generated
    pub fn is_enabled(&self) -> bool {
        self.num_queries > 1
    }

    /// The original query followed by the generated ones
    ///
    /// An expansion failure is logged and only the original is returned.
    pub async fn expand(&self, query: &str) -> Vec<String> {
        let mut queries = vec![query.to_string()];
        if !self.is_enabled() {
            return queries;
        }

        match self.generate(query, self.num_queries - 1).await {
            Ok(extra) => queries.extend(extra),
            Err(e) => warn!(error = %e, "query expansion failed, using the original query only"),
        }

        debug!(queries = queries.len(), "queries for retrieval");
        queries
    }

    async fn generate(&self, query: &str, count: usize) -> Result<Vec<String>> {
        let prompt = Prompt::new(
            EXPANSION_SYSTEM_PROMPT,
            format!(
                "Generate {} search queries, one on each line, related to the following input query:\nQuery: {}\nQueries:\n",
                count, query
            ),
        );

        let reply = self.model.complete(&prompt).await?;
        Ok(parse_queries(&self.marker, &reply, query, count))
    }
}

/// One query per non-empty line, list markers stripped, original and repeats dropped
fn parse_queries(marker: &Regex, reply: &str, original: &str, count: usize) -> Vec<String> {
    let mut queries: Vec<String> = Vec::new();
    for line in reply.lines() {
        let stripped = marker.replace(line.trim(), "");
        let cleaned = stripped.trim_matches('"').trim();

        if cleaned.is_empty()
            || cleaned.eq_ignore_ascii_case(original.trim())
            || queries.iter().any(|q| q == cleaned)
        {
            continue;
        }
        queries.push(cleaned.to_string());
        if queries.len() == count {
            break;
        }
    }
    queries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RagError;
    use crate::models::OutputSchema;
    use async_trait::async_trait;
    use serde_json::Value;

    struct ScriptedModel(Option<&'static str>);

    #[async_trait]
    impl ChatModel for ScriptedModel {
        fn describe(&self) -> String {
            "scripted".to_string()
        }

        async fn complete(&self, _prompt: &Prompt) -> Result<String> {
            self.0
                .map(str::to_string)
                .ok_or_else(|| RagError::Provider {
                    provider: "scripted".to_string(),
                    message: "rate limited".to_string(),
                })
        }

        async fn complete_structured(&self, _prompt: &Prompt, _schema: &OutputSchema) -> Result<Value> {
            Ok(Value::Null)
        }
    }

    fn marker() -> Regex {
        Regex::new(LIST_MARKER).unwrap()
    }

    #[test]
    fn test_parse_queries_strips_markers() {
        let reply = "1. effects of climate change\n2) \"rising seas\"\n\n- effects of climate change\n* ocean warming";
        assert_eq!(
            parse_queries(&marker(), reply, "climate", 5),
            vec!["effects of climate change", "rising seas", "ocean warming"]
        );
    }

    #[test]
    fn test_parse_queries_keeps_leading_numbers() {
        let reply = "2024 sea level report\n3D models of glaciers\n1. ocean warming\n-40 degree winters";
        assert_eq!(
            parse_queries(&marker(), reply, "climate", 5),
            vec!["2024 sea level report", "3D models of glaciers", "ocean warming", "-40 degree winters"]
        );
    }

    #[test]
    fn test_parse_queries_limits_count_and_drops_original() {
        let reply = "climate\nsea levels\nglaciers\nice";
        assert_eq!(parse_queries(&marker(), reply, "Climate", 2), vec!["sea levels", "glaciers"]);
    }

    #[tokio::test]
    async fn test_single_query_skips_model() {
        let expander = QueryExpander::new(Arc::new(ScriptedModel(None)), 1).unwrap();
        assert!(!expander.is_enabled());
        assert_eq!(expander.expand("climate").await, vec!["climate"]);
    }

    #[tokio::test]
    async fn test_expand_prepends_original() {
        let expander = QueryExpander::new(Arc::new(ScriptedModel(Some("sea levels\nglaciers"))), 3).unwrap();
        assert_eq!(expander.expand("climate").await, vec!["climate", "sea levels", "glaciers"]);
    }

    #[tokio::test]
    async fn test_expansion_failure_degrades_to_original() {
        let expander = QueryExpander::new(Arc::new(ScriptedModel(None)), 4).unwrap();
        assert_eq!(expander.expand("climate").await, vec!["climate"]);
    }
}
