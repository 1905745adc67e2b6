// Retrieval: vector and keyword indices plus the retrievers over them
pub mod keyword;
pub mod retriever;
pub mod vector_index;

pub use keyword::{Bm25Index, KeywordIndex};
pub use retriever::{KeywordRetriever, Retriever, VectorRetriever};
pub use vector_index::{
    build_vector_index, InMemoryVectorIndex, QdrantVectorIndex, VectorIndex,
};
