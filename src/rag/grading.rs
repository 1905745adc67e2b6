// LLM graders: passage relevance, answer groundedness and evidence highlights
use futures_util::stream::{self, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::{RagError, Result};
use crate::models::{ChatModel, OutputSchema, Prompt};
use crate::rag::context::format_docs;
use crate::types::{GroundednessLabel, Highlight, Passage, RelevanceLabel};

const RELEVANCE_SYSTEM_PROMPT: &str = "You are a grader assessing relevance of a retrieved document to a user question. \
If the document contains keyword(s) or semantic meaning related to the user question, grade it as relevant. \
Give a binary score 'yes' or 'no' score to indicate whether the document is relevant to the question.";

const GROUNDEDNESS_SYSTEM_PROMPT: &str = "You are a grader assessing whether an LLM generation is grounded in / supported by a set of retrieved facts. \
Give a binary score 'yes' or 'no'. 'Yes' means that the answer is grounded in / supported by the set of facts.";

const HIGHLIGHT_SYSTEM_PROMPT: &str = "You are an advanced assistant for document search and retrieval. \
You are provided with the following:\n\
1. A question.\n\
2. A generated answer based on the question.\n\
3. A set of documents that were referenced in generating the answer.\n\n\
Your task is to identify and extract the exact inline segments from the provided documents that directly correspond to the content used to generate the given answer. \
The extracted segments must be verbatim snippets from the documents, ensuring a word-for-word match with the text in the provided documents. \
Ensure that: (a) each segment is an exact match to a part of the document and is fully contained within the document text; \
(b) the relevance of each segment to the generated answer is clear and directly supports the answer provided; \
(c) the id of each segment is the Id line of the document it was taken from.";

/// `{binary_score: "yes" | "no"}`
pub fn binary_score_schema() -> OutputSchema {
    OutputSchema::new(
        "binary_score",
        json!({
            "type": "object",
            "properties": {
                "binary_score": {
                    "type": "string",
                    "enum": ["yes", "no"],
                    "description": "'yes' or 'no'"
                }
            },
            "required": ["binary_score"]
        }),
    )
}

/// `{id, title, source, segment}`, each a list of strings of equal length
pub fn highlight_schema() -> OutputSchema {
    let list = |description: &str| {
        json!({
            "type": "array",
            "items": {"type": "string"},
            "description": description
        })
    };

    OutputSchema::new(
        "highlight_documents",
        json!({
            "type": "object",
            "properties": {
                "id": list("List of id of docs used to answer the question"),
                "title": list("List of titles used to answer the question"),
                "source": list("List of sources used to answer the question"),
                "segment": list("List of direct segments from used documents that answer the question")
            },
            "required": ["id", "title", "source", "segment"]
        }),
    )
}

fn binary_score(value: &Value) -> Result<&str> {
    value
        .get("binary_score")
        .and_then(Value::as_str)
        .ok_or_else(|| RagError::Grading(format!("Missing binary_score in grader output: {}", value)))
}

/// Grades whether a passage is relevant to the question
pub struct RelevanceGrader {
    model: Arc<dyn ChatModel>,
    max_concurrent: usize,
}

impl RelevanceGrader {
    pub fn new(model: Arc<dyn ChatModel>, max_concurrent: usize) -> Self {
        Self {
            model,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Grade one passage
    pub async fn grade(&self, question: &str, passage: &Passage) -> Result<RelevanceLabel> {
        let prompt = Prompt::new(
            RELEVANCE_SYSTEM_PROMPT,
            format!(
                "Retrieved document: \n\n {} \n\n User question: {}",
                passage.text, question
            ),
        );

        let value = self
            .model
            .complete_structured(&prompt, &binary_score_schema())
            .await
            .map_err(|e| e.into_grading())?;

        let raw = binary_score(&value)?;
        RelevanceLabel::from_binary_score(raw)
            .ok_or_else(|| RagError::Grading(format!("Unexpected binary_score '{}'", raw)))
    }

    /// Keep the passages graded relevant, in their original order
    ///
    /// A failed grading call counts as relevant. When nothing survives the
    /// unfiltered list is returned instead.
    pub async fn filter(&self, question: &str, passages: Vec<Passage>) -> Vec<Passage> {
        if passages.is_empty() {
            return passages;
        }

        let labels: Vec<RelevanceLabel> = stream::iter(passages.iter().cloned())
            .map(|passage| async move {
                match self.grade(question, &passage).await {
                    Ok(label) => label,
                    Err(e) => {
                        warn!(passage = %passage.identifier, error = %e, "relevance grading failed, keeping passage");
                        RelevanceLabel::Relevant
                    }
                }
            })
            .buffered(self.max_concurrent)
            .collect()
            .await;

        let kept: Vec<Passage> = passages
            .iter()
            .zip(&labels)
            .filter(|(_, label)| label.is_relevant())
            .map(|(passage, _)| passage.clone())
            .collect();

        debug!(graded = passages.len(), kept = kept.len(), "relevance filtering done");

        if kept.is_empty() {
            warn!("no passage graded relevant, falling back to the unfiltered list");
            passages
        } else {
            kept
        }
    }
}

/// Grades whether an answer is supported by the evidence
pub struct GroundednessGrader {
    model: Arc<dyn ChatModel>,
}

impl GroundednessGrader {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    pub async fn grade(&self, passages: &[Passage], answer: &str) -> Result<GroundednessLabel> {
        let prompt = Prompt::new(
            GROUNDEDNESS_SYSTEM_PROMPT,
            format!(
                "Set of facts: \n\n <facts>{}</facts> \n\n LLM generation: <generation>{}</generation>",
                format_docs(passages),
                answer
            ),
        );

        let value = self
            .model
            .complete_structured(&prompt, &binary_score_schema())
            .await
            .map_err(|e| e.into_grading())?;

        let raw = binary_score(&value)?;
        GroundednessLabel::from_binary_score(raw)
            .ok_or_else(|| RagError::Grading(format!("Unexpected binary_score '{}'", raw)))
    }
}

/// Extracts verbatim evidence segments that support an answer
pub struct EvidenceHighlighter {
    model: Arc<dyn ChatModel>,
}

impl EvidenceHighlighter {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    pub async fn highlight(
        &self,
        passages: &[Passage],
        question: &str,
        answer: &str,
    ) -> Result<Vec<Highlight>> {
        let prompt = Prompt::new(
            HIGHLIGHT_SYSTEM_PROMPT,
            format!(
                "Used documents: <docs>{}</docs> \n\n User question: <question>{}</question> \n\n Generated answer: <answer>{}</answer>",
                format_docs(passages),
                question,
                answer
            ),
        );

        let value = self
            .model
            .complete_structured(&prompt, &highlight_schema())
            .await
            .map_err(|e| e.into_grading())?;

        parse_highlights(&value)
    }
}

fn string_list(value: &Value, field: &str) -> Result<Vec<String>> {
    let items = value
        .get(field)
        .and_then(Value::as_array)
        .ok_or_else(|| RagError::Grading(format!("Highlight output is missing list '{}'", field)))?;

    items
        .iter()
        .map(|item| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                RagError::Grading(format!("Highlight list '{}' holds a non-string item", field))
            })
        })
        .collect()
}

/// Zip the four parallel lists into highlights
pub fn parse_highlights(value: &Value) -> Result<Vec<Highlight>> {
    let ids = string_list(value, "id")?;
    let titles = string_list(value, "title")?;
    let sources = string_list(value, "source")?;
    let segments = string_list(value, "segment")?;

    let n = ids.len();
    if titles.len() != n || sources.len() != n || segments.len() != n {
        return Err(RagError::Grading(format!(
            "Highlight lists differ in length: id={}, title={}, source={}, segment={}",
            n,
            titles.len(),
            sources.len(),
            segments.len()
        )));
    }

    Ok(ids
        .into_iter()
        .zip(titles)
        .zip(sources)
        .zip(segments)
        .map(|(((id, title), source), segment)| Highlight {
            id,
            title,
            source,
            segment,
        })
        .collect())
}
