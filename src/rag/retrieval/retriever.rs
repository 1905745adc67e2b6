// Retrievers: one query in, one ranked list out
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::errors::Result;
use crate::models::EmbeddingModel;
use crate::rag::fusion::{KEYWORD_RETRIEVER, VECTOR_RETRIEVER};
use crate::rag::retrieval::keyword::KeywordIndex;
use crate::rag::retrieval::vector_index::VectorIndex;
use crate::types::RankedList;

/// A retrieval method producing one [`RankedList`] per query
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Name stamped on produced lists; selects the fusion weight
    fn name(&self) -> &str;

    /// Up to `k` passages for `query`, best first
    ///
    /// Any failure is reported as [`crate::errors::RagError::Retrieval`].
    async fn retrieve(&self, query: &str, k: usize) -> Result<RankedList>;
}

/// Embeds the query and searches a [`VectorIndex`]
pub struct VectorRetriever {
    embedder: Arc<dyn EmbeddingModel>,
    index: Arc<dyn VectorIndex>,
}

impl VectorRetriever {
    pub fn new(embedder: Arc<dyn EmbeddingModel>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    fn name(&self) -> &str {
        VECTOR_RETRIEVER
    }

    async fn retrieve(&self, query: &str, k: usize) -> Result<RankedList> {
        let vector = self
            .embedder
            .embed_query(query)
            .await
            .map_err(|e| e.into_retrieval())?;

        let hits = self
            .index
            .search(&vector, k)
            .await
            .map_err(|e| e.into_retrieval())?;

        debug!(retriever = VECTOR_RETRIEVER, hits = hits.len(), "vector search done");
        Ok(RankedList::from_entries(VECTOR_RETRIEVER, hits))
    }
}

/// Searches a [`KeywordIndex`]
pub struct KeywordRetriever {
    index: Arc<dyn KeywordIndex>,
}

impl KeywordRetriever {
    pub fn new(index: Arc<dyn KeywordIndex>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl Retriever for KeywordRetriever {
    fn name(&self) -> &str {
        KEYWORD_RETRIEVER
    }

    async fn retrieve(&self, query: &str, k: usize) -> Result<RankedList> {
        let hits = self
            .index
            .search(query, k)
            .map_err(|e| e.into_retrieval())?;
        debug!(retriever = KEYWORD_RETRIEVER, hits = hits.len(), "keyword search done");
        Ok(RankedList::from_entries(KEYWORD_RETRIEVER, hits))
    }
}
