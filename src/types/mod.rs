//! Type definitions module
//!
//! Request-scoped entities created fresh per query and discarded after
//! the response is returned.

pub mod passage;
pub mod result;

// Re-export commonly used types
pub use passage::{FusedList, Metadata, Passage, RankedList, ScoredPassage, SOURCE_KEY, TITLE_KEY};
pub use result::{GroundednessLabel, Highlight, QueryResult, RelevanceLabel};
