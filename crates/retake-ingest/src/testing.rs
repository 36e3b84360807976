//! Fixtures shared by the crate's tests: an in-memory fetcher and page builders.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::fetch::PageFetcher;
use retake_core::{Error, Result};
use retake_infer::{EmbedderBackend, HashingEmbedder};

#[derive(Default)]
pub(crate) struct FakeFetcher {
    pages: Mutex<HashMap<String, String>>,
    failing: Mutex<HashSet<String>>,
    hits: Mutex<Vec<String>>,
    /// Token cancelled once the paired path is requested.
    cancel_on: Mutex<Option<(String, CancellationToken)>>,
}

impl FakeFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn page(self, path: &str, html: String) -> Self {
        self.pages.lock().insert(path.to_string(), html);
        self
    }

    pub(crate) fn failing(self, path: &str) -> Self {
        self.failing.lock().insert(path.to_string());
        self
    }

    /// Cancel `token` when `path` is fetched; the page itself is still served.
    pub(crate) fn cancel_on(self, path: &str, token: CancellationToken) -> Self {
        *self.cancel_on.lock() = Some((path.to_string(), token));
        self
    }

    pub(crate) fn hits(&self) -> Vec<String> {
        self.hits.lock().clone()
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, path: &str) -> Result<String> {
        self.hits.lock().push(path.to_string());
        if let Some((trigger, token)) = self.cancel_on.lock().as_ref() {
            if trigger == path {
                token.cancel();
            }
        }
        if self.failing.lock().contains(path) {
            return Err(Error::UpstreamUnavailable(format!("{} unreachable", path)));
        }
        self.pages
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::UpstreamUnavailable(format!("HTTP 404: {}", path)))
    }
}

/// Hashing embedder that refuses any text containing `marker`.
pub(crate) struct FailingEmbedder {
    inner: HashingEmbedder,
    marker: String,
}

impl FailingEmbedder {
    pub(crate) fn new(dim: usize, marker: &str) -> Self {
        Self {
            inner: HashingEmbedder::new(dim),
            marker: marker.to_string(),
        }
    }
}

#[async_trait]
impl EmbedderBackend for FailingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.contains(&self.marker) {
            return Err(Error::Embedding(format!("refusing '{}'", self.marker)));
        }
        self.inner.embed(text).await
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn version(&self) -> String {
        self.inner.version()
    }
}

pub(crate) fn next_data_page(data: Value) -> String {
    format!(
        r#"<html><head></head><body><script id="__NEXT_DATA__" type="application/json">{}</script></body></html>"#,
        data
    )
}

pub(crate) fn event_page(event: Value) -> String {
    next_data_page(json!({ "props": { "pageProps": { "event": event } } }))
}

pub(crate) fn series_page(series: Value) -> String {
    next_data_page(json!({ "props": { "pageProps": { "series": series } } }))
}

/// One completed map with `rounds` rounds. Team 1 wins every round except
/// multiples of three; round 5 is a flawless. Round `n` starts at
/// `100_000 * n` ms of game time.
pub(crate) fn completed_map(match_id: i64, map: &str, rounds: i64) -> (Value, Vec<Value>) {
    let mut round_values = Vec::new();
    let mut kills = Vec::new();
    for n in 1..=rounds {
        let round_id = match_id * 1000 + n;
        let mut round = json!({
            "id": round_id,
            "number": n,
            "winningTeamNumber": if n % 3 == 0 { 2 } else { 1 },
            "winCondition": "kills",
        });
        if n == 5 {
            round["ceremony"] = json!("CeremonyFlawless");
        }
        round_values.push(round);
        kills.push(json!({
            "roundId": round_id,
            "gameTimeMillis": 100_000 * n + 7_000,
            "roundTimeMillis": 7_000,
        }));
    }
    let map_match = json!({
        "id": match_id,
        "completed": true,
        "map": { "name": map },
        "vodUrl": "https://www.youtube.com/watch?v=abc123&t=600s",
        "rounds": round_values,
    });
    (map_match, kills)
}

pub(crate) fn series(series_id: i64, maps: Vec<(Value, Vec<Value>)>) -> Value {
    let mut matches = Vec::new();
    let mut kills = Vec::new();
    for (m, k) in maps {
        matches.push(m);
        kills.extend(k);
    }
    json!({
        "id": series_id,
        "startDate": "2024-03-17T15:00:00.000Z",
        "team1": { "name": "Paper Rex" },
        "team2": { "name": "Team Heretics" },
        "stats": { "kills": kills },
        "matches": matches,
    })
}

/// Event 123 with two series, one 13-round map each.
pub(crate) fn two_match_event() -> FakeFetcher {
    FakeFetcher::new()
        .page(
            "/events/123",
            event_page(json!({
                "id": 123,
                "name": "Champions Tour Masters",
                "series": [{ "id": 501 }, { "id": 502 }],
            })),
        )
        .page(
            "/series/501",
            series_page(series(501, vec![completed_map(9001, "Haven", 13)])),
        )
        .page(
            "/series/502",
            series_page(series(502, vec![completed_map(9002, "Lotus", 13)])),
        )
}
