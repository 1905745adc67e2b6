//! Character-window text splitting with overlap

use tracing::info;

use crate::errors::{RagError, Result};
use crate::ingest::loader::Document;
use crate::types::Passage;

/// Replace tabs with spaces and `" \n"` paragraph separators with a space
pub fn clean_text(text: &str) -> String {
    text.replace('\t', " ").replace(" \n", " ")
}

/// Splits documents into passages of at most `chunk_size` characters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::Configuration(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::Configuration(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Split and clean every document; ids are `"{source}#{chunk_index}"`
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Passage> {
        let passages: Vec<Passage> = documents
            .iter()
            .flat_map(|doc| {
                self.split_text(&doc.text)
                    .into_iter()
                    .enumerate()
                    .map(move |(idx, chunk)| Passage {
                        identifier: format!("{}#{}", doc.source(), idx),
                        text: clean_text(&chunk),
                        metadata: doc.metadata.clone(),
                        relevance_score: None,
                    })
            })
            .collect();

        info!(documents = documents.len(), passages = passages.len(), "split documents");
        passages
    }

    /// Split one text into overlapping windows
    ///
    /// Each window ends at the last paragraph break, line break, sentence
    /// end or space inside it, in that order of preference, falling back to
    /// a hard cut. The next window starts `chunk_overlap` characters before
    /// that end, moved forward to a word start.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < len {
            let limit = (start + self.chunk_size).min(len);
            let end = if limit == len {
                len
            } else {
                self.find_break(&chars, start, limit)
            };

            let chunk: String = chars[start..end].iter().collect();
            let chunk = chunk.trim();
            if !chunk.is_empty() {
                chunks.push(chunk.to_string());
            }

            if end == len {
                break;
            }

            let mut next = end - self.chunk_overlap;
            while next < end && !chars[next - 1].is_whitespace() {
                next += 1;
            }
            start = next;
        }

        chunks
    }

    /// Exclusive end of the window starting at `start`
    ///
    /// Always greater than `start + chunk_overlap` so the next window
    /// starts strictly later.
    fn find_break(&self, chars: &[char], start: usize, limit: usize) -> usize {
        let min_end = start + self.chunk_overlap + 1;
        let window = |end: usize| end >= min_end && end <= limit;

        let last_where = |pred: &dyn Fn(usize) -> bool| -> Option<usize> {
            (min_end..=limit).rev().find(|&end| window(end) && pred(end))
        };

        let paragraph = |end: usize| end >= 2 && chars[end - 1] == '\n' && chars[end - 2] == '\n';
        let line = |end: usize| chars[end - 1] == '\n';
        let sentence = |end: usize| {
            end >= 2 && chars[end - 1].is_whitespace() && matches!(chars[end - 2], '.' | '!' | '?')
        };
        let word = |end: usize| chars[end - 1].is_whitespace();

        last_where(&paragraph)
            .or_else(|| last_where(&line))
            .or_else(|| last_where(&sentence))
            .or_else(|| last_where(&word))
            .unwrap_or(limit)
    }
}
