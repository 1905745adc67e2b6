//! Grade labels, highlights and the final query result

use serde::{Deserialize, Serialize};

use crate::types::passage::Passage;

/// Parse a structured `binary_score` field ("yes" / "no")
fn parse_binary_score(raw: &str) -> Option<bool> {
    let normalized = raw
        .trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    match normalized.as_str() {
        "yes" | "true" => Some(true),
        "no" | "false" => Some(false),
        _ => None,
    }
}

/// Outcome of grading one passage against the question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelevanceLabel {
    Relevant,
    Irrelevant,
}

impl RelevanceLabel {
    /// Map a grader `binary_score`; `None` when it is neither yes nor no
    pub fn from_binary_score(raw: &str) -> Option<Self> {
        parse_binary_score(raw).map(|yes| if yes { Self::Relevant } else { Self::Irrelevant })
    }

    pub fn is_relevant(&self) -> bool {
        matches!(self, Self::Relevant)
    }
}

/// Outcome of checking the answer against the evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroundednessLabel {
    Grounded,
    NotGrounded,
}

impl GroundednessLabel {
    /// Map a grader `binary_score`; `None` when it is neither yes nor no
    pub fn from_binary_score(raw: &str) -> Option<Self> {
        parse_binary_score(raw).map(|yes| if yes { Self::Grounded } else { Self::NotGrounded })
    }
}

/// A verbatim evidence span that supports the answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    /// Identifier of the passage the segment was taken from
    pub id: String,
    pub title: String,
    pub source: String,
    pub segment: String,
}

impl Highlight {
    /// True when the segment occurs verbatim in the passage it names
    pub fn is_verbatim_in(&self, passages: &[Passage]) -> bool {
        passages
            .iter()
            .filter(|p| p.identifier == self.id)
            .any(|p| p.text.contains(self.segment.trim()))
    }
}

/// Final output of one pipeline invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub question: String,
    pub answer: String,
    /// Passages the answer was generated from, after relevance filtering
    pub documents_used: Vec<Passage>,
    /// `None` when the check is disabled or the grader failed
    pub hallucination_score: Option<GroundednessLabel>,
    /// `None` when highlighting is disabled or the highlighter failed
    pub highlights: Option<Vec<Highlight>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relevance_label_parsing() {
        assert_eq!(RelevanceLabel::from_binary_score("yes"), Some(RelevanceLabel::Relevant));
        assert_eq!(RelevanceLabel::from_binary_score(" No. "), Some(RelevanceLabel::Irrelevant));
        assert_eq!(RelevanceLabel::from_binary_score("\"YES\""), Some(RelevanceLabel::Relevant));
        assert_eq!(RelevanceLabel::from_binary_score("maybe"), None);
        assert_eq!(RelevanceLabel::from_binary_score(""), None);
    }

    #[test]
    fn test_groundedness_label_parsing() {
        assert_eq!(GroundednessLabel::from_binary_score("yes"), Some(GroundednessLabel::Grounded));
        assert_eq!(GroundednessLabel::from_binary_score("no"), Some(GroundednessLabel::NotGrounded));
        assert_eq!(GroundednessLabel::from_binary_score("partially"), None);
    }

    #[test]
    fn test_groundedness_serializes_snake_case() {
        let json = serde_json::to_string(&GroundednessLabel::NotGrounded).unwrap();
        assert_eq!(json, "\"not_grounded\"");
    }

    #[test]
    fn test_highlight_verbatim_check() {
        let passages = vec![Passage::new("p1", "Climate change raises sea levels.")];
        let good = Highlight {
            id: "p1".to_string(),
            title: String::new(),
            source: String::new(),
            segment: "raises sea levels".to_string(),
        };
        let wrong_passage = Highlight { id: "p2".to_string(), ..good.clone() };
        let paraphrased = Highlight { segment: "sea levels go up".to_string(), ..good.clone() };

        assert!(good.is_verbatim_in(&passages));
        assert!(!wrong_passage.is_verbatim_in(&passages));
        assert!(!paraphrased.is_verbatim_in(&passages));
    }
}
