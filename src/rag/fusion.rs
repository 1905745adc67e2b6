// Weighted reciprocal-rank fusion of ranked retrieval lists
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::config::RetrieverConfig;
use crate::errors::{RagError, Result};
use crate::types::{FusedList, Passage, RankedList};

/// Name carried by lists from the dense vector retriever
pub const VECTOR_RETRIEVER: &str = "vector";

/// Name carried by lists from the BM25 keyword retriever
pub const KEYWORD_RETRIEVER: &str = "keyword";

/// Allowed distance of the weight sum from 1.0
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Per-retriever fusion weights, validated on construction
#[derive(Debug, Clone, PartialEq)]
pub struct FusionWeights {
    weights: BTreeMap<String, f64>,
}

impl FusionWeights {
    /// Build weights from `(retriever, weight)` pairs
    ///
    /// Every weight must be finite and non-negative and the sum must be
    /// 1.0 within [`WEIGHT_TOLERANCE`].
    pub fn new<I, S>(weights: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let weights: BTreeMap<String, f64> =
            weights.into_iter().map(|(name, w)| (name.into(), w)).collect();

        if weights.is_empty() {
            return Err(RagError::Configuration(
                "At least one retriever weight is required".to_string(),
            ));
        }

        for (name, weight) in &weights {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(RagError::Configuration(format!(
                    "Fusion weight for '{}' must be a non-negative number, got {}",
                    name, weight
                )));
            }
        }

        let sum: f64 = weights.values().sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(RagError::Configuration(format!(
                "Fusion weights must sum to 1.0, got {}",
                sum
            )));
        }

        Ok(Self { weights })
    }

    /// Vector and keyword weights from the `[retriever]` section
    pub fn from_config(config: &RetrieverConfig) -> Result<Self> {
        Self::new([
            (VECTOR_RETRIEVER, config.vector_weight),
            (KEYWORD_RETRIEVER, config.keyword_weight),
        ])
    }

    /// Weight of a retriever, if it is known
    pub fn get(&self, retriever: &str) -> Option<f64> {
        self.weights.get(retriever).copied()
    }
}

/// Fuses ranked lists into one ordered, de-duplicated list
#[derive(Debug, Clone)]
pub struct RankFuser {
    weights: FusionWeights,
    top_k: usize,
}

impl RankFuser {
    pub fn new(weights: FusionWeights, top_k: usize) -> Self {
        Self { weights, top_k }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Fuse the lists
    ///
    /// The item at position `i` of a list contributes `weight / (i + 1)` to
    /// its identifier's score. A passage repeated within one list counts
    /// only at its best position. Output is sorted by fused score
    /// descending, ties by identifier ascending, truncated to `top_k`, with
    /// the fused score written into `relevance_score`.
    pub fn fuse(&self, lists: &[RankedList]) -> Result<FusedList> {
        let mut scores: HashMap<&str, f64> = HashMap::new();
        let mut passages: HashMap<&str, &Passage> = HashMap::new();

        for list in lists {
            let weight = self.weights.get(&list.retriever).ok_or_else(|| {
                RagError::Configuration(format!(
                    "No fusion weight configured for retriever '{}'",
                    list.retriever
                ))
            })?;

            let mut seen: HashSet<&str> = HashSet::new();
            for (position, entry) in list.entries.iter().enumerate() {
                let id = entry.passage.identifier.as_str();
                if !seen.insert(id) {
                    continue;
                }
                *scores.entry(id).or_insert(0.0) += weight / (position as f64 + 1.0);
                passages.entry(id).or_insert(&entry.passage);
            }
        }

        let mut ranked: Vec<(&str, f64)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        ranked.truncate(self.top_k);

        Ok(ranked
            .into_iter()
            .filter_map(|(id, score)| {
                passages.get(id).map(|passage| {
                    let mut fused = (*passage).clone();
                    fused.relevance_score = Some(score);
                    fused
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::TestResult;
    use quickcheck_macros::quickcheck;

    fn weights(vector: f64, keyword: f64) -> FusionWeights {
        FusionWeights::new([(VECTOR_RETRIEVER, vector), (KEYWORD_RETRIEVER, keyword)]).unwrap()
    }

    fn list(retriever: &str, ids: &[&str]) -> RankedList {
        RankedList::from_entries(
            retriever,
            ids.iter()
                .enumerate()
                .map(|(i, id)| (Passage::new(*id, format!("text of {}", id)), 1.0 / (i as f64 + 1.0))),
        )
    }

    fn ids(fused: &FusedList) -> Vec<&str> {
        fused.iter().map(|p| p.identifier.as_str()).collect()
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let err = FusionWeights::new([(VECTOR_RETRIEVER, 0.6), (KEYWORD_RETRIEVER, 0.3)]).unwrap_err();
        assert!(matches!(err, RagError::Configuration(_)));
    }

    #[test]
    fn test_weights_within_tolerance() {
        assert!(FusionWeights::new([(VECTOR_RETRIEVER, 0.6), (KEYWORD_RETRIEVER, 0.4 + 5e-7)]).is_ok());
        assert!(FusionWeights::new([(VECTOR_RETRIEVER, 0.6), (KEYWORD_RETRIEVER, 0.4 + 5e-6)]).is_err());
    }

    #[test]
    fn test_negative_weight_rejected() {
        let err = FusionWeights::new([(VECTOR_RETRIEVER, 1.5), (KEYWORD_RETRIEVER, -0.5)]).unwrap_err();
        assert!(err.to_string().contains("non-negative"));
    }

    #[test]
    fn test_weights_from_config() {
        let config = RetrieverConfig::default();
        let weights = FusionWeights::from_config(&config).unwrap();
        assert_eq!(weights.get(VECTOR_RETRIEVER), Some(config.vector_weight));
        assert_eq!(weights.get(KEYWORD_RETRIEVER), Some(config.keyword_weight));
        assert_eq!(weights.get("other"), None);
    }

    #[test]
    fn test_fuse_scores_and_order() {
        let fuser = RankFuser::new(weights(0.5, 0.5), 10);
        let fused = fuser
            .fuse(&[
                list(VECTOR_RETRIEVER, &["a", "b", "c"]),
                list(KEYWORD_RETRIEVER, &["b", "c", "d"]),
            ])
            .unwrap();

        // b: 0.5/2 + 0.5/1 = 0.75, a: 0.5, c: 0.5/3 + 0.5/2, d: 0.5/3
        assert_eq!(ids(&fused), vec!["b", "a", "c", "d"]);
        assert!((fused[0].relevance_score.unwrap() - 0.75).abs() < 1e-12);
        assert!((fused[1].relevance_score.unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_ties_broken_by_identifier() {
        let fuser = RankFuser::new(weights(0.5, 0.5), 10);
        let fused = fuser
            .fuse(&[list(VECTOR_RETRIEVER, &["z"]), list(KEYWORD_RETRIEVER, &["m"])])
            .unwrap();
        assert_eq!(ids(&fused), vec!["m", "z"]);
    }

    #[test]
    fn test_truncates_to_top_k() {
        let fuser = RankFuser::new(weights(1.0, 0.0), 2);
        let fused = fuser.fuse(&[list(VECTOR_RETRIEVER, &["a", "b", "c"])]).unwrap();
        assert_eq!(ids(&fused), vec!["a", "b"]);
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        let fuser = RankFuser::new(weights(0.5, 0.5), 4);
        assert!(fuser.fuse(&[]).unwrap().is_empty());
        assert!(fuser
            .fuse(&[RankedList::new(VECTOR_RETRIEVER), RankedList::new(KEYWORD_RETRIEVER)])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_duplicate_within_list_scored_once() {
        let fuser = RankFuser::new(weights(1.0, 0.0), 10);
        let fused = fuser.fuse(&[list(VECTOR_RETRIEVER, &["a", "b", "a"])]).unwrap();
        assert_eq!(ids(&fused), vec!["a", "b"]);
        assert_eq!(fused[0].relevance_score, Some(1.0));
    }

    #[test]
    fn test_sub_query_lists_sum() {
        let fuser = RankFuser::new(weights(0.6, 0.4), 10);
        let fused = fuser
            .fuse(&[
                list(VECTOR_RETRIEVER, &["a"]),
                list(VECTOR_RETRIEVER, &["b", "a"]),
                list(KEYWORD_RETRIEVER, &["b"]),
            ])
            .unwrap();
        // a: 0.6 + 0.3 = 0.9, b: 0.6 + 0.4 = 1.0
        assert_eq!(ids(&fused), vec!["b", "a"]);
        assert!((fused[1].relevance_score.unwrap() - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_retriever_is_configuration_error() {
        let fuser = RankFuser::new(weights(0.5, 0.5), 4);
        let err = fuser.fuse(&[list("sparse", &["a"])]).unwrap_err();
        assert!(matches!(err, RagError::Configuration(ref m) if m.contains("sparse")));
    }

    #[test]
    fn test_keeps_passage_metadata() {
        let passage = Passage::new("doc#0", "Sea levels rise").with_metadata("title", "Climate");
        let ranked = RankedList::from_entries(VECTOR_RETRIEVER, vec![(passage, 0.2)]);
        let fused = RankFuser::new(weights(1.0, 0.0), 1).fuse(&[ranked]).unwrap();
        assert_eq!(fused[0].title(), "Climate");
        assert_eq!(fused[0].text, "Sea levels rise");
    }

    fn build_lists(vector: &[u8], keyword: &[u8]) -> Vec<RankedList> {
        let names = |raw: &[u8]| -> Vec<String> { raw.iter().map(|b| format!("p{}", b % 16)).collect() };
        let v = names(vector);
        let k = names(keyword);
        vec![
            list(VECTOR_RETRIEVER, &v.iter().map(String::as_str).collect::<Vec<_>>()),
            list(KEYWORD_RETRIEVER, &k.iter().map(String::as_str).collect::<Vec<_>>()),
        ]
    }

    #[quickcheck]
    fn prop_fusion_is_deterministic(vector: Vec<u8>, keyword: Vec<u8>) -> bool {
        let fuser = RankFuser::new(weights(0.6, 0.4), 8);
        let lists = build_lists(&vector, &keyword);
        fuser.fuse(&lists).unwrap() == fuser.fuse(&lists).unwrap()
    }

    #[quickcheck]
    fn prop_fusion_covers_union_without_duplicates(vector: Vec<u8>, keyword: Vec<u8>) -> TestResult {
        let lists = build_lists(&vector, &keyword);
        let union: HashSet<String> = lists
            .iter()
            .flat_map(|l| l.entries.iter().map(|e| e.passage.identifier.clone()))
            .collect();

        let fuser = RankFuser::new(weights(0.6, 0.4), union.len());
        let fused = fuser.fuse(&lists).unwrap();
        let out: HashSet<String> = fused.iter().map(|p| p.identifier.clone()).collect();

        TestResult::from_bool(out.len() == fused.len() && out == union)
    }

    #[quickcheck]
    fn prop_fusion_sorted_descending(vector: Vec<u8>, keyword: Vec<u8>) -> bool {
        let fuser = RankFuser::new(weights(0.3, 0.7), 16);
        let fused = fuser.fuse(&build_lists(&vector, &keyword)).unwrap();
        fused.windows(2).all(|pair| {
            let (a, b) = (pair[0].relevance_score.unwrap(), pair[1].relevance_score.unwrap());
            a > b || (a == b && pair[0].identifier < pair[1].identifier)
        })
    }

    #[quickcheck]
    fn prop_fused_scores_bounded_by_weight_sum(vector: Vec<u8>, keyword: Vec<u8>) -> bool {
        let fuser = RankFuser::new(weights(0.5, 0.5), 16);
        let fused = fuser.fuse(&build_lists(&vector, &keyword)).unwrap();
        fused
            .iter()
            .all(|p| p.relevance_score.map_or(false, |s| s > 0.0 && s <= 1.0 + 1e-12))
    }
}
