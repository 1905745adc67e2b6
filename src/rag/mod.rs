// RAG core: fusion retrieval and answer grounding
//
// Components:
// - Retrieval: vector and BM25 retrievers over the indexed corpus
// - Expansion: LLM paraphrases for multi-query retrieval
// - Fusion: weighted reciprocal-rank fusion of ranked lists
// - Grading: relevance filter, groundedness check, evidence highlights
// - Generator: answer generation from the filtered evidence
// - Pipeline: end-to-end orchestration

pub mod context;
pub mod expansion;
pub mod fusion;
pub mod generator;
pub mod grading;
pub mod pipeline;
pub mod retrieval;

// Re-export key types
pub use context::format_docs;
pub use expansion::QueryExpander;
pub use fusion::{FusionWeights, RankFuser, KEYWORD_RETRIEVER, VECTOR_RETRIEVER};
pub use generator::AnswerGenerator;
pub use grading::{EvidenceHighlighter, GroundednessGrader, RelevanceGrader};
pub use pipeline::{PipelineSettings, RagPipeline, Stage};
pub use retrieval::Retriever;
