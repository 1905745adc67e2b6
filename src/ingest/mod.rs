//! Corpus ingestion: load sources, split them into passages
//!
//! Runs once while the pipeline is built. Passage identifiers are
//! `"{source}#{chunk_index}"`, stable for a fixed corpus and splitter
//! configuration.

pub mod loader;
pub mod splitter;

pub use loader::{Document, DocumentLoader, HtmlStripper};
pub use splitter::{clean_text, TextSplitter};

use crate::config::DataConfig;
use crate::errors::Result;
use crate::types::Passage;

/// Load every configured source and split it into passages
pub async fn build_corpus(config: &DataConfig) -> Result<Vec<Passage>> {
    let loader = DocumentLoader::new(&config.extensions)?;
    let splitter = TextSplitter::new(config.chunk_size, config.chunk_overlap)?;

    let documents = loader.load_all(&config.sources).await?;
    Ok(splitter.split_documents(&documents))
}
