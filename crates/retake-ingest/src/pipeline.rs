//! Ingestion pipeline: event URL → discovered series → committed, indexed rounds.

use std::sync::Arc;

use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::discovery::discover;
use crate::extract::{extract_series, ExtractedMatch};
use crate::fetch::{extract_next_data, fetch_cancellable, PageFetcher};
use crate::source::{EventSource, SeriesSource};
use crate::summary::SummaryFields;
use retake_core::{Error, Result};
use retake_index::{EntryMetadata, SemanticIndex};
use retake_infer::EmbedderBackend;
use retake_store::{Event, NewRound, SqliteStore, StoredEmbedding};

/// Terminal summary of one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub event_id: String,
    pub event_name: String,
    pub source_url: String,
    /// False when the event already existed and only new series were processed.
    pub created_event: bool,
    pub series_found: usize,
    pub matches_added: usize,
    pub matches_skipped: usize,
    pub matches_failed: usize,
    pub rounds_added: usize,
    pub rounds_skipped: usize,
    pub message: String,
}

#[derive(Debug, Default)]
struct Tally {
    matches_added: usize,
    matches_skipped: usize,
    matches_failed: usize,
    rounds_added: usize,
    rounds_skipped: usize,
}

impl Tally {
    fn absorb(&mut self, other: Tally) {
        self.matches_added += other.matches_added;
        self.matches_skipped += other.matches_skipped;
        self.matches_failed += other.matches_failed;
        self.rounds_added += other.rounds_added;
        self.rounds_skipped += other.rounds_skipped;
    }
}

enum MatchOutcome {
    Added(usize),
    Skipped(usize),
}

pub struct IngestionPipeline {
    store: Arc<SqliteStore>,
    index: Arc<SemanticIndex>,
    embedder: Arc<dyn EmbedderBackend>,
    fetcher: Arc<dyn PageFetcher>,
    workers: usize,
    /// Serialises commit + index insert per event.
    event_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<SqliteStore>,
        index: Arc<SemanticIndex>,
        embedder: Arc<dyn EmbedderBackend>,
        fetcher: Arc<dyn PageFetcher>,
        workers: usize,
    ) -> Self {
        Self {
            store,
            index,
            embedder,
            fetcher,
            workers: workers.max(1),
            event_locks: DashMap::new(),
        }
    }

    /// Ingest an event. Re-ingesting a known event only adds unseen matches.
    ///
    /// Fails as a whole only for an unsupported URL, an unreachable event
    /// page, an embedder/index version mismatch, or cancellation. Per-series
    /// and per-match failures are counted in the report.
    pub async fn ingest(&self, event_url: &str, cancel: &CancellationToken) -> Result<IngestReport> {
        let source = EventSource::parse(event_url)?;
        self.check_version()?;

        let discovered = discover(self.fetcher.as_ref(), &source, cancel).await?;
        let (event, created_event) = self.resolve_event(&source, &discovered.name)?;
        info!(
            "Ingesting {} series into event {} ({})",
            discovered.series_ids.len(),
            event.id,
            if created_event { "new" } else { "update mode" }
        );

        let event_ref = &event;
        let tallies: Vec<Tally> = stream::iter(discovered.series_ids.clone())
            .map(|series_id| async move {
                self.ingest_series(event_ref, &series_id, cancel).await
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        if cancel.is_cancelled() {
            warn!("Ingestion of {} cancelled", event.source_url);
            return Err(Error::Cancelled);
        }

        let mut total = Tally::default();
        for tally in tallies {
            total.absorb(tally);
        }
        Ok(report(event, created_event, discovered.series_ids.len(), total))
    }

    /// Ingest a single series page and attach it to the event it belongs to.
    ///
    /// The event is created on first sight, named after the series payload.
    /// Unlike a whole-event run, a series that cannot be fetched or parsed
    /// fails the call.
    pub async fn ingest_series_url(
        &self,
        series_url: &str,
        cancel: &CancellationToken,
    ) -> Result<IngestReport> {
        let source = SeriesSource::parse(series_url)?;
        self.check_version()?;

        let html = fetch_cancellable(self.fetcher.as_ref(), &source.path, cancel).await?;
        let data = extract_next_data(&html)?;
        let (event_id, event_name) = series_event(&data).ok_or_else(|| {
            Error::Extraction(format!("series {} names no event", source.external_id))
        })?;
        let matches = extract_series(&source.external_id, &data)?;

        let event_source = EventSource::from_id(&event_id);
        let name = event_name.unwrap_or_else(|| format!("Event {}", event_id));
        let (event, created_event) = self.resolve_event(&event_source, &name)?;
        info!("Ingesting series {} into event {}", source.external_id, event.id);

        let tally = self
            .ingest_matches(&event, &source.external_id, matches, cancel)
            .await;
        if cancel.is_cancelled() {
            warn!("Ingestion of series {} cancelled", source.external_id);
            return Err(Error::Cancelled);
        }
        Ok(report(event, created_event, 1, tally))
    }

    /// Remove an event with its matches, rounds and index entries.
    pub async fn delete_event(&self, event_id: &str) -> Result<usize> {
        let lock = self.event_lock(event_id);
        let _guard = lock.lock().await;
        let round_ids = self.store.delete_event(event_id)?;
        for id in &round_ids {
            self.index.remove(*id);
        }
        self.event_locks.remove(event_id);
        Ok(round_ids.len())
    }

    /// Find the event by its source id, creating it on first sight.
    fn resolve_event(&self, source: &EventSource, name: &str) -> Result<(Event, bool)> {
        if let Some(event) = self.store.find_event_by_external_id(&source.external_id)? {
            return Ok((event, false));
        }
        let canonical = source.canonical_url();
        match self.store.create_event(&canonical, &source.external_id, name) {
            Ok(event) => Ok((event, true)),
            // Lost a race with a concurrent run on the same event.
            Err(Error::Conflict(_)) => self
                .store
                .find_event_by_external_id(&source.external_id)?
                .map(|event| (event, false))
                .ok_or_else(|| Error::Internal(format!("event for {} vanished", canonical))),
            Err(e) => Err(e),
        }
    }

    fn check_version(&self) -> Result<()> {
        if self.embedder.version() != self.index.version() {
            return Err(Error::EmbeddingMismatch(format!(
                "embedder produces '{}' but the index holds '{}'",
                self.embedder.version(),
                self.index.version()
            )));
        }
        Ok(())
    }

    fn event_lock(&self, event_id: &str) -> Arc<Mutex<()>> {
        self.event_locks
            .entry(event_id.to_string())
            .or_default()
            .clone()
    }

    async fn ingest_series(&self, event: &Event, series_id: &str, cancel: &CancellationToken) -> Tally {
        let path = format!("/series/{}", series_id);
        let extracted = fetch_cancellable(self.fetcher.as_ref(), &path, cancel)
            .await
            .and_then(|html| extract_next_data(&html))
            .and_then(|data| extract_series(series_id, &data));

        match extracted {
            Ok(matches) => self.ingest_matches(event, series_id, matches, cancel).await,
            Err(Error::Cancelled) => Tally::default(),
            Err(e) => {
                warn!("Series {} failed: {}", series_id, e);
                Tally {
                    matches_failed: 1,
                    ..Default::default()
                }
            }
        }
    }

    async fn ingest_matches(
        &self,
        event: &Event,
        series_id: &str,
        matches: Vec<ExtractedMatch>,
        cancel: &CancellationToken,
    ) -> Tally {
        let mut tally = Tally::default();
        for extracted in matches {
            if cancel.is_cancelled() {
                break;
            }
            let external_id = extracted.new_match.external_id.clone();
            match self.ingest_match(event, extracted, cancel).await {
                Ok(MatchOutcome::Added(rounds)) => {
                    tally.matches_added += 1;
                    tally.rounds_added += rounds;
                }
                Ok(MatchOutcome::Skipped(rounds)) => {
                    tally.matches_skipped += 1;
                    tally.rounds_skipped += rounds;
                }
                Err(Error::Cancelled) => break,
                Err(e) => {
                    error!("Match {} in series {} failed: {}", external_id, series_id, e);
                    tally.matches_failed += 1;
                }
            }
        }
        tally
    }

    async fn ingest_match(
        &self,
        event: &Event,
        extracted: ExtractedMatch,
        cancel: &CancellationToken,
    ) -> Result<MatchOutcome> {
        let ExtractedMatch { new_match, rounds } = extracted;
        if self.store.match_exists(&event.id, &new_match.external_id)? {
            debug!("Match {} already ingested", new_match.external_id);
            return Ok(MatchOutcome::Skipped(rounds.len()));
        }

        let summaries: Vec<String> = rounds
            .iter()
            .map(|r| SummaryFields::from_extracted(&new_match, r).render())
            .collect();
        let vectors = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            vectors = self.embedder.embed_batch(&summaries) => vectors?,
        };
        if vectors.len() != summaries.len() {
            return Err(Error::Embedding(format!(
                "expected {} embeddings, got {}",
                summaries.len(),
                vectors.len()
            )));
        }

        let version = self.embedder.version();
        let new_rounds: Vec<NewRound> = rounds
            .into_iter()
            .zip(summaries)
            .zip(vectors)
            .map(|((r, summary_text), vector)| NewRound {
                external_id: r.external_id,
                round_num: r.round_num,
                score_a: r.score_a,
                score_b: r.score_b,
                winning_team: r.winning_team,
                round_type: r.round_type,
                is_pistol: r.is_pistol,
                win_condition: r.win_condition,
                vod_url: r.vod_url,
                vod_timestamp: r.vod_timestamp,
                summary_text,
                embedding: Some(StoredEmbedding {
                    version: version.clone(),
                    vector,
                }),
            })
            .collect();

        let lock = self.event_lock(&event.id);
        let _guard = lock.lock().await;

        let (stored_match, stored_rounds) =
            match self.store.commit_match(&event.id, &new_match, &new_rounds) {
                Ok(committed) => committed,
                Err(Error::Conflict(reason)) => {
                    debug!("Skipping match: {}", reason);
                    return Ok(MatchOutcome::Skipped(new_rounds.len()));
                }
                Err(e) => return Err(e),
            };

        let entries = stored_rounds
            .iter()
            .zip(&new_rounds)
            .filter_map(|(round, new)| {
                new.embedding
                    .as_ref()
                    .map(|emb| (round.id, emb, EntryMetadata::from_round(&stored_match, round)))
            })
            .collect();
        self.index.insert_batch(entries)?;

        info!(
            "Added match {} ({} on {}) with {} rounds",
            stored_match.external_id,
            stored_match.team_a,
            stored_match.map_name,
            stored_rounds.len()
        );
        Ok(MatchOutcome::Added(stored_rounds.len()))
    }
}

fn report(event: Event, created_event: bool, series_found: usize, total: Tally) -> IngestReport {
    let message = format!(
        "Ingested {} rounds from {} new matches ({} matches / {} rounds skipped, {} failed).",
        total.rounds_added,
        total.matches_added,
        total.matches_skipped,
        total.rounds_skipped,
        total.matches_failed
    );
    info!("{} [{}]", message, event.source_url);

    IngestReport {
        event_id: event.id,
        event_name: event.name,
        source_url: event.source_url,
        created_event,
        series_found,
        matches_added: total.matches_added,
        matches_skipped: total.matches_skipped,
        matches_failed: total.matches_failed,
        rounds_added: total.rounds_added,
        rounds_skipped: total.rounds_skipped,
        message,
    }
}

/// Event id and name from a series payload: `eventId` or `event.id`.
fn series_event(data: &Value) -> Option<(String, Option<String>)> {
    let series = data.pointer("/props/pageProps/series")?;
    let event = series.get("event");
    let id = series
        .get("eventId")
        .or_else(|| event.and_then(|e| e.get("id")))
        .and_then(|v| match v {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        })?;
    let name = event
        .and_then(|e| e.get("name"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);
    Some((id, name))
}
