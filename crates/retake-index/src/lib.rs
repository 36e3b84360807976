//! Retake Index — vector search over round summaries.
//!
//! The index holds only the vector-to-round-id mapping plus the metadata
//! needed for filtering; round content is hydrated from the store.

pub mod filters;
pub mod semantic;

pub use filters::{team_slug, EntryMetadata, IndexFilters};
pub use semantic::{similarity_percent, SearchHit, SemanticIndex};
