//! Retake Ingest — turn a tournament event URL into stored, indexed rounds.
//!
//! `source` validates event and series URLs, `fetch` retrieves pages, `discovery` walks
//! the event tree for series, `extract` turns a series payload into matches
//! and rounds, `summary` renders the text that gets embedded, and `pipeline`
//! ties it together with deduplication and per-match transactions.

pub mod discovery;
pub mod extract;
pub mod fetch;
pub mod pipeline;
pub mod reindex;
pub mod source;
pub mod summary;

#[cfg(test)]
pub(crate) mod testing;

pub use discovery::{discover, DiscoveredEvent};
pub use extract::{extract_series, ExtractedMatch, ExtractedRound};
pub use fetch::{extract_next_data, HttpFetcher, PageFetcher, RetryPolicy};
pub use pipeline::{IngestReport, IngestionPipeline};
pub use reindex::{reindex_all, ReindexReport};
pub use source::{EventSource, SeriesSource};
pub use summary::SummaryFields;
