// End-to-end pipeline: retrieve, fuse, grade, generate, check, highlight
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::errors::{RagError, Result};
use crate::ingest;
use crate::models::{build_chat_model, build_embedding_model, ChatModel, EmbeddingModel};
use crate::rag::expansion::QueryExpander;
use crate::rag::fusion::{FusionWeights, RankFuser};
use crate::rag::generator::AnswerGenerator;
use crate::rag::grading::{EvidenceHighlighter, GroundednessGrader, RelevanceGrader};
use crate::rag::retrieval::{
    build_vector_index, Bm25Index, KeywordRetriever, Retriever, VectorIndex, VectorRetriever,
};
use crate::types::{FusedList, Passage, QueryResult, RankedList};

/// Passages embedded per provider call while indexing
const EMBED_BATCH_SIZE: usize = 64;

/// Pipeline stages, visited strictly in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Retrieve,
    /// Skipped when retrieval produced a single list
    Fuse,
    GradeRelevance,
    GenerateAnswer,
    /// Runs only when `evaluation.hallucination_check` is set
    GradeGroundedness,
    /// Runs only when `evaluation.highlight_segments` is set
    Highlight,
    Done,
}

impl Stage {
    /// Whether a failure in this stage ends the request
    pub fn is_fatal(&self) -> bool {
        matches!(self, Stage::Retrieve | Stage::Fuse | Stage::GenerateAnswer)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Retrieve => "retrieve",
            Stage::Fuse => "fuse",
            Stage::GradeRelevance => "grade_relevance",
            Stage::GenerateAnswer => "generate_answer",
            Stage::GradeGroundedness => "grade_groundedness",
            Stage::Highlight => "highlight",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunables the orchestrator needs at query time
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub weights: FusionWeights,
    /// Candidates requested from each retriever
    pub similarity_top_k: usize,
    /// Passages kept after fusion
    pub top_k: usize,
    pub num_queries: usize,
    pub hallucination_check: bool,
    pub highlight_segments: bool,
    pub max_concurrent_grades: usize,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            weights: FusionWeights::from_config(&config.retriever)?,
            similarity_top_k: config.retriever.similarity_top_k,
            top_k: config.retriever.top_k,
            num_queries: config.retriever.num_queries,
            hallucination_check: config.evaluation.hallucination_check,
            highlight_segments: config.evaluation.highlight_segments,
            max_concurrent_grades: config.evaluation.max_concurrent_grades,
        })
    }
}

/// Built pipeline, shared read-only across requests
pub struct RagPipeline {
    retrievers: Vec<Arc<dyn Retriever>>,
    expander: QueryExpander,
    fuser: RankFuser,
    relevance: RelevanceGrader,
    generator: AnswerGenerator,
    groundedness: Option<GroundednessGrader>,
    highlighter: Option<EvidenceHighlighter>,
    similarity_top_k: usize,
    corpus_size: usize,
}

impl RagPipeline {
    /// Assemble a pipeline from already-built collaborators
    ///
    /// The generator model also drives query expansion and evidence
    /// highlighting; the grader model drives the relevance and
    /// groundedness graders.
    pub fn new(
        retrievers: Vec<Arc<dyn Retriever>>,
        generator_model: Arc<dyn ChatModel>,
        grader_model: Arc<dyn ChatModel>,
        settings: PipelineSettings,
    ) -> Result<Self> {
        if retrievers.is_empty() {
            return Err(RagError::Configuration(
                "At least one retriever is required".to_string(),
            ));
        }
        for retriever in &retrievers {
            if settings.weights.get(retriever.name()).is_none() {
                return Err(RagError::Configuration(format!(
                    "No fusion weight configured for retriever '{}'",
                    retriever.name()
                )));
            }
        }

        Ok(Self {
            retrievers,
            expander: QueryExpander::new(generator_model.clone(), settings.num_queries)?,
            fuser: RankFuser::new(settings.weights, settings.top_k),
            relevance: RelevanceGrader::new(grader_model.clone(), settings.max_concurrent_grades),
            generator: AnswerGenerator::new(generator_model.clone()),
            groundedness: settings
                .hallucination_check
                .then(|| GroundednessGrader::new(grader_model)),
            highlighter: settings
                .highlight_segments
                .then(|| EvidenceHighlighter::new(generator_model.clone())),
            similarity_top_k: settings.similarity_top_k,
            corpus_size: 0,
        })
    }

    /// Load and index the corpus, connect the models, validate everything
    ///
    /// Fails fast: configuration problems, unreachable sources, an empty
    /// corpus or an indexing failure surface here rather than on the
    /// first request.
    pub async fn build(config: &Config) -> Result<Self> {
        config.validate()?;
        let settings = PipelineSettings::from_config(config)?;

        let embedder = build_embedding_model(&config.embeddings)?;
        let generator_model = build_chat_model(&config.llms.generator)?;
        let grader_model = build_chat_model(&config.llms.grader)?;
        info!(
            generator = %generator_model.describe(),
            grader = %grader_model.describe(),
            embeddings = %config.embeddings.provider,
            "models configured"
        );

        let passages = ingest::build_corpus(&config.data)
            .await
            .map_err(|e| e.into_retrieval())?;
        if passages.is_empty() {
            return Err(RagError::Retrieval(
                "Corpus is empty: no passages were produced from data.sources".to_string(),
            ));
        }

        let index = build_vector_index(&config.vector_store)?;
        index_passages(embedder.as_ref(), index.as_ref(), &passages).await?;
        let keyword_index =
            Arc::new(Bm25Index::build(passages.iter().cloned()).map_err(|e| e.into_retrieval())?);
        let corpus_size = passages.len();
        info!(passages = corpus_size, backend = ?config.vector_store.backend, "corpus indexed");

        let retrievers: Vec<Arc<dyn Retriever>> = vec![
            Arc::new(VectorRetriever::new(embedder, index)),
            Arc::new(KeywordRetriever::new(keyword_index)),
        ];

        let mut pipeline = Self::new(retrievers, generator_model, grader_model, settings)?;
        pipeline.corpus_size = corpus_size;
        Ok(pipeline)
    }

    /// Number of passages indexed by [`RagPipeline::build`]
    pub fn corpus_size(&self) -> usize {
        self.corpus_size
    }

    /// Answer one question
    ///
    /// Only retrieval, fusion and generation failures are returned as
    /// errors; grading failures degrade the result instead.
    pub async fn answer(&self, question: &str) -> Result<QueryResult> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::InvalidQuery("Question must not be empty".to_string()));
        }

        let request_id = Uuid::new_v4();
        let span = info_span!("query", request_id = %request_id);
        self.run(question).instrument(span).await
    }

    async fn run(&self, question: &str) -> Result<QueryResult> {
        info!(question = %question, "query received");

        let lists = self
            .retrieve(question)
            .await
            .map_err(|e| self.abort(Stage::Retrieve, e))?;

        let candidates = self
            .fuse(lists)
            .map_err(|e| self.abort(Stage::Fuse, e))?;

        debug!(stage = %Stage::GradeRelevance, candidates = candidates.len());
        let documents_used = self.relevance.filter(question, candidates).await;

        debug!(stage = %Stage::GenerateAnswer, documents = documents_used.len());
        let answer = self
            .generator
            .generate(question, &documents_used)
            .await
            .map_err(|e| self.abort(Stage::GenerateAnswer, e))?;

        let hallucination_score = match &self.groundedness {
            Some(grader) => {
                debug!(stage = %Stage::GradeGroundedness);
                match grader.grade(&documents_used, &answer).await {
                    Ok(label) => Some(label),
                    Err(e) => {
                        self.absorb(Stage::GradeGroundedness, &e);
                        None
                    }
                }
            }
            None => None,
        };

        let highlights = match &self.highlighter {
            Some(highlighter) => {
                debug!(stage = %Stage::Highlight);
                match highlighter.highlight(&documents_used, question, &answer).await {
                    Ok(highlights) => {
                        for highlight in highlights.iter().filter(|h| !h.is_verbatim_in(&documents_used)) {
                            warn!(id = %highlight.id, segment = %highlight.segment, "highlight is not verbatim evidence");
                        }
                        Some(highlights)
                    }
                    Err(e) => {
                        self.absorb(Stage::Highlight, &e);
                        None
                    }
                }
            }
            None => None,
        };

        info!(
            stage = %Stage::Done,
            documents = documents_used.len(),
            grounded = ?hallucination_score,
            highlights = highlights.as_ref().map(Vec::len),
            "query answered"
        );

        Ok(QueryResult {
            question: question.to_string(),
            answer,
            documents_used,
            hallucination_score,
            highlights,
        })
    }

    /// One list per (query, retriever) pair, queries in expansion order
    async fn retrieve(&self, question: &str) -> Result<Vec<RankedList>> {
        let queries = self.expander.expand(question).await;

        let mut lists = Vec::with_capacity(queries.len() * self.retrievers.len());
        for query in &queries {
            for retriever in &self.retrievers {
                let list = retriever
                    .retrieve(query, self.similarity_top_k)
                    .await
                    .map_err(|e| e.into_retrieval())?;
                debug!(stage = %Stage::Retrieve, retriever = retriever.name(), hits = list.len());
                lists.push(list);
            }
        }
        Ok(lists)
    }

    fn fuse(&self, mut lists: Vec<RankedList>) -> Result<FusedList> {
        if lists.len() >= 2 {
            let fused = self.fuser.fuse(&lists)?;
            debug!(stage = %Stage::Fuse, lists = lists.len(), fused = fused.len());
            return Ok(fused);
        }

        // Repeats keep their best position
        let mut seen = HashSet::new();
        let mut passages: Vec<Passage> = lists.pop().map(RankedList::into_passages).unwrap_or_default();
        passages.retain(|p| seen.insert(p.identifier.clone()));
        passages.truncate(self.fuser.top_k());
        Ok(passages)
    }

    fn abort(&self, stage: Stage, error: RagError) -> RagError {
        warn!(stage = %stage, fatal = stage.is_fatal(), error = %error, "stage failed");
        error
    }

    fn absorb(&self, stage: Stage, error: &RagError) {
        warn!(stage = %stage, error = %error, "stage failed, continuing without its result");
    }
}

/// Embed passages in batches and write them to the vector index
pub async fn index_passages(
    embedder: &dyn EmbeddingModel,
    index: &dyn VectorIndex,
    passages: &[Passage],
) -> Result<()> {
    for batch in passages.chunks(EMBED_BATCH_SIZE) {
        let texts: Vec<String> = batch.iter().map(|p| p.text.clone()).collect();
        let vectors = embedder
            .embed_documents(&texts)
            .await
            .map_err(|e| e.into_retrieval())?;
        index
            .upsert(batch, vectors)
            .await
            .map_err(|e| e.into_retrieval())?;
    }
    Ok(())
}
