//! Retake Resolve — natural-language round search.
//!
//! The intent parser pulls team, map and round type out of a query with
//! static keyword lists; the orchestrator embeds the query, searches the
//! semantic index under the merged filters and hydrates the hits.

pub mod intent;
pub mod orchestrator;
pub mod types;

pub use intent::{parse_intent, Intent};
pub use orchestrator::QueryOrchestrator;
pub use types::*;
