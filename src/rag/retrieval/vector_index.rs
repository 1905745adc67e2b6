// Dense vector indices: in-memory cosine and Qdrant
use async_trait::async_trait;
use qdrant_client::{
    client::QdrantClient,
    qdrant::{
        value::Kind, vectors_config::Config, with_payload_selector::SelectorOptions,
        CreateCollection, Distance, PointStruct, SearchPoints, Value as QdrantValue, VectorParams,
        VectorsConfig, WithPayloadSelector,
    },
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{VectorBackend, VectorStoreConfig};
use crate::errors::{RagError, Result};
use crate::types::{Metadata, Passage};

/// Store of passage embeddings searchable by similarity
///
/// Written only while the pipeline is built; read-only while serving.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace passages with their embeddings
    async fn upsert(&self, passages: &[Passage], vectors: Vec<Vec<f32>>) -> Result<()>;

    /// Up to `k` passages most similar to `vector`, best first
    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<(Passage, f64)>>;

    /// Number of indexed passages
    async fn len(&self) -> Result<usize>;
}

/// Build the index selected by `[vector_store].backend`
pub fn build_vector_index(config: &VectorStoreConfig) -> Result<Arc<dyn VectorIndex>> {
    match config.backend {
        VectorBackend::Memory => Ok(Arc::new(InMemoryVectorIndex::new())),
        VectorBackend::Qdrant => Ok(Arc::new(QdrantVectorIndex::new(
            &config.url,
            &config.collection,
        )?)),
    }
}

fn check_batch(passages: &[Passage], vectors: &[Vec<f32>]) -> Result<()> {
    if passages.len() != vectors.len() {
        return Err(RagError::Retrieval(format!(
            "Got {} embeddings for {} passages",
            vectors.len(),
            passages.len()
        )));
    }
    Ok(())
}

/// Cosine similarity, 0.0 for mismatched or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}

/// Brute-force cosine index held in process memory
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    entries: RwLock<Vec<(Passage, Vec<f32>)>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(&self, passages: &[Passage], vectors: Vec<Vec<f32>>) -> Result<()> {
        check_batch(passages, &vectors)?;

        let mut entries = self.entries.write().await;
        for (passage, vector) in passages.iter().zip(vectors) {
            match entries
                .iter_mut()
                .find(|(existing, _)| existing.identifier == passage.identifier)
            {
                Some(slot) => *slot = (passage.clone(), vector),
                None => entries.push((passage.clone(), vector)),
            }
        }
        Ok(())
    }

    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<(Passage, f64)>> {
        let entries = self.entries.read().await;

        let mut scored: Vec<(&Passage, f64)> = entries
            .iter()
            .map(|(passage, stored)| (passage, cosine_similarity(vector, stored) as f64))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.identifier.cmp(&b.0.identifier))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(passage, score)| (passage.clone(), score))
            .collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().await.len())
    }
}

const IDENTIFIER_FIELD: &str = "identifier";
const TEXT_FIELD: &str = "text";

/// Index backed by a Qdrant collection
///
/// Point ids are UUIDv5 of the passage identifier, which is also stored
/// in the payload together with the text and metadata.
pub struct QdrantVectorIndex {
    client: QdrantClient,
    collection: String,
}

impl QdrantVectorIndex {
    pub fn new(url: &str, collection: &str) -> Result<Self> {
        let client = QdrantClient::from_url(url)
            .build()
            .map_err(|e| RagError::Configuration(format!("Failed to create Qdrant client: {}", e)))?;

        Ok(Self {
            client,
            collection: collection.to_string(),
        })
    }

    /// Create the collection with cosine distance if it does not exist
    async fn ensure_collection(&self, dimensions: u64) -> Result<()> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| RagError::Retrieval(format!("Failed to list Qdrant collections: {}", e)))?;

        if collections.collections.iter().any(|c| c.name == self.collection) {
            return Ok(());
        }

        info!(collection = %self.collection, dimensions, "creating Qdrant collection");
        self.client
            .create_collection(&CreateCollection {
                collection_name: self.collection.clone(),
                vectors_config: Some(VectorsConfig {
                    config: Some(Config::Params(VectorParams {
                        size: dimensions,
                        distance: Distance::Cosine.into(),
                        ..Default::default()
                    })),
                }),
                ..Default::default()
            })
            .await
            .map_err(|e| {
                RagError::Retrieval(format!(
                    "Failed to create collection {}: {}",
                    self.collection, e
                ))
            })?;

        Ok(())
    }
}

fn point_id(identifier: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, identifier.as_bytes()).to_string()
}

fn to_payload(passage: &Passage) -> HashMap<String, QdrantValue> {
    let mut payload: HashMap<String, QdrantValue> = passage
        .metadata
        .iter()
        .map(|(k, v)| (k.clone(), QdrantValue::from(v.clone())))
        .collect();
    payload.insert(
        IDENTIFIER_FIELD.to_string(),
        QdrantValue::from(passage.identifier.clone()),
    );
    payload.insert(TEXT_FIELD.to_string(), QdrantValue::from(passage.text.clone()));
    payload
}

fn from_payload(payload: HashMap<String, QdrantValue>) -> Option<Passage> {
    let mut identifier = None;
    let mut text = None;
    let mut metadata = Metadata::new();

    for (key, value) in payload {
        let Some(Kind::StringValue(s)) = value.kind else {
            continue;
        };
        match key.as_str() {
            IDENTIFIER_FIELD => identifier = Some(s),
            TEXT_FIELD => text = Some(s),
            _ => {
                metadata.insert(key, s);
            }
        }
    }

    Some(Passage {
        identifier: identifier?,
        text: text?,
        metadata,
        relevance_score: None,
    })
}

#[async_trait]
impl VectorIndex for QdrantVectorIndex {
    async fn upsert(&self, passages: &[Passage], vectors: Vec<Vec<f32>>) -> Result<()> {
        check_batch(passages, &vectors)?;
        let Some(dimensions) = vectors.first().map(|v| v.len() as u64) else {
            return Ok(());
        };
        self.ensure_collection(dimensions).await?;

        let points: Vec<PointStruct> = passages
            .iter()
            .zip(vectors)
            .map(|(passage, vector)| {
                PointStruct::new(point_id(&passage.identifier), vector, to_payload(passage))
            })
            .collect();

        debug!(collection = %self.collection, points = points.len(), "upserting points");
        self.client
            .upsert_points_blocking(self.collection.clone(), None, points, None)
            .await
            .map_err(|e| RagError::Retrieval(format!("Failed to upsert points: {}", e)))?;

        Ok(())
    }

    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<(Passage, f64)>> {
        let response = self
            .client
            .search_points(&SearchPoints {
                collection_name: self.collection.clone(),
                vector: vector.to_vec(),
                limit: k as u64,
                with_payload: Some(WithPayloadSelector {
                    selector_options: Some(SelectorOptions::Enable(true)),
                }),
                ..Default::default()
            })
            .await
            .map_err(|e| RagError::Retrieval(format!("Failed to search points: {}", e)))?;

        Ok(response
            .result
            .into_iter()
            .filter_map(|point| {
                let score = point.score as f64;
                from_payload(point.payload).map(|passage| (passage, score))
            })
            .collect())
    }

    async fn len(&self) -> Result<usize> {
        let info = self
            .client
            .collection_info(self.collection.clone())
            .await
            .map_err(|e| RagError::Retrieval(format!("Failed to get collection info: {}", e)))?;

        Ok(info.result.and_then(|r| r.points_count).unwrap_or(0) as usize)
    }
}
