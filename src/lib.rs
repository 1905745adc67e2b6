//! fusionrag - Fusion retrieval and answer-grounding RAG service
//!
//! # Architecture
//!
//! - **Ingestion**: load files, directories and URLs; split into passages
//! - **Retrieval**: vector (in-memory or Qdrant) and BM25 keyword indices
//! - **Fusion**: weighted reciprocal-rank fusion across retrievers and sub-queries
//! - **Grading**: relevance filter, groundedness check, evidence highlighting
//! - **Serving**: axum HTTP API and a clap CLI over one built pipeline

pub mod errors;
pub mod types;
pub mod config;
pub mod models;
pub mod ingest;
pub mod rag;
pub mod server;
pub mod telemetry;
pub mod cli;

// Re-export commonly used types
pub use config::Config;
pub use errors::{RagError, Result};
pub use rag::RagPipeline;
pub use types::{Passage, QueryResult};
