//! Query orchestrator: intent + embedding + filtered index search + hydration.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::intent::{parse_intent, Intent};
use crate::types::{QueryRequest, QueryResponse, QueryResult, ResultMetadata};
use retake_core::{Error, Result};
use retake_index::{similarity_percent, IndexFilters, SemanticIndex};
use retake_infer::{EmbedderBackend, QueryCache};
use retake_store::{HydratedRound, SqliteStore, StoredEmbedding};

pub struct QueryOrchestrator {
    store: Arc<SqliteStore>,
    index: Arc<SemanticIndex>,
    embedder: Arc<dyn EmbedderBackend>,
    cache: QueryCache,
    max_results: usize,
    /// Hits farther than this cosine distance are dropped.
    max_distance: Option<f64>,
}

impl QueryOrchestrator {
    pub fn new(
        store: Arc<SqliteStore>,
        index: Arc<SemanticIndex>,
        embedder: Arc<dyn EmbedderBackend>,
        max_results: usize,
    ) -> Self {
        Self {
            store,
            index,
            embedder,
            cache: QueryCache::with_defaults(),
            max_results: max_results.max(1),
            max_distance: None,
        }
    }

    pub fn with_max_distance(mut self, max_distance: Option<f64>) -> Self {
        self.max_distance = max_distance;
        self
    }

    /// Run a query. Zero candidates is a successful, empty response.
    pub async fn query(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let text = request.query_text.trim();
        let intent = parse_intent(text);
        if text.is_empty() {
            return Ok(QueryResponse {
                intent,
                results: Vec::new(),
            });
        }

        let k = request.n_results.clamp(1, self.max_results as i64) as usize;
        let query = self.embed_query(text).await?;

        let filter_sets = filter_sets(&intent, request.filters.as_ref());
        let hits = self.index.search_all(&query, k, &filter_sets)?;
        debug!(
            "Query '{}' → {} hits (k={}, intent={:?})",
            text,
            hits.len(),
            k,
            intent
        );

        let mut seen = HashSet::with_capacity(hits.len());
        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let distance = hit.distance as f64;
            if self.max_distance.is_some_and(|max| distance > max) {
                continue;
            }
            if !seen.insert(hit.round_id) {
                continue;
            }
            let hydrated = match self.store.hydrate_round(hit.round_id) {
                Ok(h) => h,
                // Deleted between search and hydration.
                Err(Error::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            results.push(to_result(hydrated, distance));
        }

        Ok(QueryResponse { intent, results })
    }

    /// Embed query text with the round embedder, through the cache.
    async fn embed_query(&self, text: &str) -> Result<StoredEmbedding> {
        let version = self.embedder.version();
        let vector = match self.cache.get(&version, text) {
            Some(v) => v,
            None => {
                let v = self.embedder.embed(text).await?;
                self.cache.put(&version, text, v.clone());
                v
            }
        };
        Ok(StoredEmbedding { version, vector })
    }

}

/// Intent filters plus the caller's, minus empty sets; a hit must pass all.
fn filter_sets(intent: &Intent, caller: Option<&IndexFilters>) -> Vec<IndexFilters> {
    let mut sets = vec![intent.to_filters()];
    if let Some(caller) = caller {
        sets.push(caller.clone());
    }
    sets.retain(|f| !f.is_empty());
    sets
}

fn to_result(hydrated: HydratedRound, distance: f64) -> QueryResult {
    let HydratedRound {
        round,
        match_info,
        event,
    } = hydrated;
    QueryResult {
        id: round.external_id,
        distance,
        similarity: similarity_percent(distance),
        document: round.summary_text,
        event_id: event.id,
        metadata: ResultMetadata {
            team_a: match_info.team_a,
            team_b: match_info.team_b,
            score_a: round.score_a,
            score_b: round.score_b,
            map_name: match_info.map_name,
            round_num: round.round_num,
            winning_team: round.winning_team,
            round_type: round.round_type,
            is_pistol: round.is_pistol,
            win_condition: round.win_condition,
            date: match_info.date,
            vod_url: round.vod_url,
            vod_timestamp: round.vod_timestamp,
            event_name: event.name,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retake_index::EntryMetadata;
    use retake_infer::HashingEmbedder;
    use retake_store::{NewMatch, NewRound, RoundType};
    use tempfile::TempDir;

    const DIM: usize = 128;

    struct Fixture {
        _dir: TempDir,
        store: Arc<SqliteStore>,
        index: Arc<SemanticIndex>,
        orchestrator: QueryOrchestrator,
        embedder: HashingEmbedder,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteStore::open(dir.path().join("retake.db")).unwrap());
        let embedder = HashingEmbedder::new(DIM);
        let index = Arc::new(SemanticIndex::new(embedder.version(), DIM));
        let orchestrator = QueryOrchestrator::new(
            store.clone(),
            index.clone(),
            Arc::new(HashingEmbedder::new(DIM)),
            50,
        );
        Fixture {
            _dir: dir,
            store,
            index,
            orchestrator,
            embedder,
        }
    }

    /// Store and index one match; returns the event id.
    fn seed(
        f: &Fixture,
        url: &str,
        match_ext: &str,
        teams: (&str, &str),
        map: &str,
        rounds: &[(i32, RoundType, &str)],
    ) -> String {
        let event = match f.store.find_event_by_source(url).unwrap() {
            Some(e) => e,
            None => f.store.create_event(url, url, url).unwrap(),
        };
        let new_match = NewMatch {
            external_id: match_ext.into(),
            series_id: "1".into(),
            team_a: teams.0.into(),
            team_b: teams.1.into(),
            map_name: map.into(),
            date: None,
        };
        let new_rounds: Vec<NewRound> = rounds
            .iter()
            .map(|(n, t, summary)| NewRound {
                external_id: format!("{}-{}", match_ext, n),
                round_num: *n,
                score_a: 0,
                score_b: 0,
                winning_team: teams.0.into(),
                round_type: *t,
                is_pistol: *n == 1 || *n == 13,
                win_condition: Some("kills".into()),
                vod_url: None,
                vod_timestamp: None,
                summary_text: summary.to_string(),
                embedding: Some(StoredEmbedding {
                    version: f.embedder.version(),
                    vector: f.embedder.embed_text(summary),
                }),
            })
            .collect();
        let (m, stored) = f.store.commit_match(&event.id, &new_match, &new_rounds).unwrap();
        let entries = stored
            .iter()
            .zip(&new_rounds)
            .map(|(r, n)| {
                (
                    r.id,
                    n.embedding.as_ref().unwrap(),
                    EntryMetadata::from_round(&m, r),
                )
            })
            .collect();
        f.index.insert_batch(entries).unwrap();
        event.id
    }

    fn seeded() -> (Fixture, String, String) {
        let f = fixture();
        let masters = seed(
            &f,
            "https://rib.gg/events/1",
            "m1",
            ("Paper Rex", "Team Heretics"),
            "Haven",
            &[
                (1, RoundType::Pistol, "Pistol round on Haven won by Paper Rex"),
                (5, RoundType::Flawless, "Flawless round on Haven by Paper Rex"),
                (9, RoundType::Eco, "Eco round on Haven won by Paper Rex"),
            ],
        );
        let champs = seed(
            &f,
            "https://rib.gg/events/2",
            "m2",
            ("Sentinels", "LOUD"),
            "Lotus",
            &[
                (1, RoundType::Pistol, "Pistol round on Lotus won by Sentinels"),
                (7, RoundType::Clutch, "Clutch round on Lotus by Sentinels"),
            ],
        );
        (f, masters, champs)
    }

    #[tokio::test]
    async fn test_intent_restricts_results() {
        let (f, _, _) = seeded();
        let mut request = QueryRequest::new("PRX pistol on Haven");
        request.n_results = 10;
        let response = f.orchestrator.query(&request).await.unwrap();

        assert_eq!(response.intent.team.as_deref(), Some("paperrex"));
        assert_eq!(response.intent.map.as_deref(), Some("Haven"));
        assert_eq!(response.intent.round_type, Some(RoundType::Pistol));
        assert_eq!(response.results.len(), 1);
        let top = &response.results[0];
        assert_eq!(top.id, "m1-1");
        assert_eq!(top.metadata.map_name, "Haven");
        assert_eq!(top.similarity, similarity_percent(top.distance));
    }

    #[tokio::test]
    async fn test_event_scope_is_authoritative() {
        let (f, masters, champs) = seeded();
        let mut request = QueryRequest::new("round won");
        request.n_results = 10;
        request.filters = Some(IndexFilters {
            event_id: Some(champs.clone()),
            ..Default::default()
        });
        let response = f.orchestrator.query(&request).await.unwrap();
        assert_eq!(response.results.len(), 2);
        assert!(response.results.iter().all(|r| r.event_id == champs));
        assert!(response.results.iter().all(|r| r.event_id != masters));
    }

    #[tokio::test]
    async fn test_conflicting_intent_and_scope_yield_empty_success() {
        let (f, masters, _) = seeded();
        let mut request = QueryRequest::new("clutch on Lotus");
        request.filters = Some(IndexFilters {
            event_id: Some(masters),
            ..Default::default()
        });
        let response = f.orchestrator.query(&request).await.unwrap();
        assert!(response.results.is_empty());
        assert_eq!(response.intent.map.as_deref(), Some("Lotus"));
    }

    #[tokio::test]
    async fn test_results_are_ranked_and_limited() {
        let (f, _, _) = seeded();
        let mut request = QueryRequest::new("Haven round Paper Rex");
        request.n_results = 2;
        let response = f.orchestrator.query(&request).await.unwrap();
        assert_eq!(response.results.len(), 2);
        assert!(response.results[0].distance <= response.results[1].distance);

        request.n_results = -3;
        assert_eq!(f.orchestrator.query(&request).await.unwrap().results.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_index_and_empty_query() {
        let f = fixture();
        let response = f.orchestrator.query(&QueryRequest::new("ace on bind")).await.unwrap();
        assert!(response.results.is_empty());
        assert_eq!(response.intent.round_type, Some(RoundType::Ace));

        let response = f.orchestrator.query(&QueryRequest::new("   ")).await.unwrap();
        assert!(response.results.is_empty());
        assert!(response.intent.is_empty());
    }

    #[tokio::test]
    async fn test_deleted_rounds_are_skipped() {
        let (f, masters, _) = seeded();
        // Store rows go away but the index still holds the entries.
        f.store.delete_event(&masters).unwrap();
        let mut request = QueryRequest::new("round");
        request.n_results = 10;
        let response = f.orchestrator.query(&request).await.unwrap();
        assert_eq!(response.results.len(), 2);
        assert_eq!(f.index.len(), 5);
    }

    #[tokio::test]
    async fn test_repeated_query_is_deterministic() {
        let (f, _, _) = seeded();
        let request = QueryRequest::new("pistol round");
        let a = f.orchestrator.query(&request).await.unwrap();
        let b = f.orchestrator.query(&request).await.unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_filter_sets_skip_empty() {
        assert!(filter_sets(&parse_intent("anything"), None).is_empty());

        let sets = filter_sets(&parse_intent("loud eco"), None);
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].team.as_deref(), Some("loud"));
        assert_eq!(sets[0].round_type, Some(RoundType::Eco));

        let scope = IndexFilters {
            event_id: Some("e1".into()),
            ..Default::default()
        };
        let sets = filter_sets(&parse_intent("anything"), Some(&scope));
        assert_eq!(sets, vec![scope.clone()]);
        assert_eq!(filter_sets(&parse_intent("loud eco"), Some(&scope)).len(), 2);
    }

    #[tokio::test]
    async fn test_max_distance_drops_weak_hits() {
        let (f, _, _) = seeded();
        let mut request = QueryRequest::new("round won");
        request.n_results = 10;
        let baseline = f.orchestrator.query(&request).await.unwrap().results;
        assert_eq!(baseline.len(), 5);

        let cut = baseline[1].distance;
        let strict = QueryOrchestrator::new(
            f.store.clone(),
            f.index.clone(),
            Arc::new(HashingEmbedder::new(DIM)),
            50,
        )
        .with_max_distance(Some(cut));
        let kept = strict.query(&request).await.unwrap().results;
        assert_eq!(kept.len(), baseline.iter().filter(|r| r.distance <= cut).count());
        assert!(kept.len() >= 2);
        assert!(kept.iter().all(|r| r.distance <= cut));
    }
}
