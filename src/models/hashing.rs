//! Local hashing embedder
//!
//! Deterministic bag-of-words vectors: each lowercase alphanumeric term is
//! hashed into a dimension, term frequencies accumulate and the vector is
//! L2-normalised. Needs no network or API key, so it backs offline runs
//! and tests.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::errors::Result;
use crate::models::EmbeddingModel;

/// Dimensionality used when the config does not set one
pub const DEFAULT_DIMENSIONS: usize = 256;

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    /// Embed one text synchronously
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        let lowered = text.to_lowercase();
        let mut tf: HashMap<&str, usize> = HashMap::new();
        for term in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            *tf.entry(term).or_insert(0) += 1;
        }

        for (term, count) in &tf {
            let idx = djb2(term) % self.dimensions;
            vector[idx] += *count as f32;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

fn djb2(s: &str) -> usize {
    let mut hash: usize = 5381;
    for b in s.bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(b as usize);
    }
    hash
}

#[async_trait]
impl EmbeddingModel for HashingEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_embedding_is_normalised() {
        let embedder = HashingEmbedder::new(64);
        let v = embedder.embed("Sea levels rise as the climate warms");
        assert_eq!(v.len(), 64);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::default();
        assert!(embedder.embed("  ...  ").iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_similar_texts_score_higher() {
        let embedder = HashingEmbedder::new(256);
        let query = embedder.embed("climate change sea levels");
        let close = embedder.embed("Climate change raises sea levels.");
        let far = embedder.embed("Coffee is brewed from roasted beans.");
        assert!(dot(&query, &close) > dot(&query, &far));
    }

    #[tokio::test]
    async fn test_query_and_document_embeddings_agree() {
        let embedder = HashingEmbedder::new(32);
        let docs = embedder
            .embed_documents(&["glaciers melt".to_string()])
            .await
            .unwrap();
        let query = embedder.embed_query("glaciers melt").await.unwrap();
        assert_eq!(docs[0], query);
    }
}
