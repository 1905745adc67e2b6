//! Passage and ranked-list types shared by retrieval and fusion
//!
//! A [`Passage`] is created by a retriever at query time and treated as
//! read-only downstream. A [`RankedList`] is the output of one retrieval
//! method for one query; position 0 is the best match for that method.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// String metadata attached to a passage (title, source, ...)
pub type Metadata = BTreeMap<String, String>;

/// Output of the rank fuser, best first, no duplicate identifiers
pub type FusedList = Vec<Passage>;

/// Metadata key holding the human readable document title
pub const TITLE_KEY: &str = "title";

/// Metadata key holding the document origin (path or URL)
pub const SOURCE_KEY: &str = "source";

/// A unit of retrieved text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// Stable within a corpus
    pub identifier: String,
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
    /// Retriever- or fuser-specific score, absent until scored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
}

impl Passage {
    /// Create a passage without metadata
    pub fn new(identifier: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            text: text.into(),
            metadata: Metadata::new(),
            relevance_score: None,
        }
    }

    /// Builder-style metadata insertion
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Title metadata, empty when missing
    pub fn title(&self) -> &str {
        self.metadata.get(TITLE_KEY).map(String::as_str).unwrap_or("")
    }

    /// Source metadata, empty when missing
    pub fn source(&self) -> &str {
        self.metadata.get(SOURCE_KEY).map(String::as_str).unwrap_or("")
    }
}

/// A passage paired with the raw score its retriever assigned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPassage {
    pub passage: Passage,
    pub raw_score: f64,
}

/// Ordered results of one retrieval method for one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedList {
    /// Name of the retriever that produced the list; selects the fusion weight
    pub retriever: String,
    pub entries: Vec<ScoredPassage>,
}

impl RankedList {
    /// Create an empty list for a retriever
    pub fn new(retriever: impl Into<String>) -> Self {
        Self {
            retriever: retriever.into(),
            entries: Vec::new(),
        }
    }

    /// Create a list from passages already in rank order
    pub fn from_entries(
        retriever: impl Into<String>,
        entries: impl IntoIterator<Item = (Passage, f64)>,
    ) -> Self {
        Self {
            retriever: retriever.into(),
            entries: entries
                .into_iter()
                .map(|(passage, raw_score)| ScoredPassage { passage, raw_score })
                .collect(),
        }
    }

    /// Append the next-ranked passage
    pub fn push(&mut self, passage: Passage, raw_score: f64) {
        self.entries.push(ScoredPassage { passage, raw_score });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Passages in rank order with raw scores applied as relevance scores
    pub fn into_passages(self) -> Vec<Passage> {
        self.entries
            .into_iter()
            .map(|entry| {
                let mut passage = entry.passage;
                passage.relevance_score = Some(entry.raw_score);
                passage
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passage_metadata_accessors() {
        let passage = Passage::new("doc#0", "text")
            .with_metadata(TITLE_KEY, "Climate")
            .with_metadata(SOURCE_KEY, "data/climate.md");
        assert_eq!(passage.title(), "Climate");
        assert_eq!(passage.source(), "data/climate.md");
        assert!(passage.relevance_score.is_none());
    }

    #[test]
    fn test_missing_metadata_is_empty() {
        let passage = Passage::new("doc#1", "text");
        assert_eq!(passage.title(), "");
        assert_eq!(passage.source(), "");
    }

    #[test]
    fn test_ranked_list_keeps_order() {
        let mut list = RankedList::new("vector");
        list.push(Passage::new("a", "first"), 0.9);
        list.push(Passage::new("b", "second"), 0.4);
        assert_eq!(list.len(), 2);

        let passages = list.into_passages();
        assert_eq!(passages[0].identifier, "a");
        assert_eq!(passages[1].relevance_score, Some(0.4));
    }
}
