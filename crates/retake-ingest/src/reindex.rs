//! Regenerate every round summary and embedding with the current embedder.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::summary::SummaryFields;
use retake_core::{Error, Result};
use retake_infer::EmbedderBackend;
use retake_store::{Match, Round, SqliteStore, StoredEmbedding};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReindexReport {
    pub version: String,
    pub matches: usize,
    pub rounds: usize,
}

/// Rewrite all summaries and embeddings in place, one match per embed batch
/// and per transaction.
///
/// Run before the index is loaded; the caller rebuilds the index afterwards.
pub async fn reindex_all(store: &SqliteStore, embedder: &dyn EmbedderBackend) -> Result<ReindexReport> {
    let version = embedder.version();
    let mut by_match: BTreeMap<i64, (Match, Vec<Round>)> = BTreeMap::new();
    for (m, r) in store.all_rounds()? {
        by_match.entry(m.id).or_insert_with(|| (m, Vec::new())).1.push(r);
    }
    info!(
        "Reindexing {} matches with embedder {}",
        by_match.len(),
        version
    );

    let mut report = ReindexReport {
        version: version.clone(),
        ..Default::default()
    };
    for (m, rounds) in by_match.values() {
        let summaries: Vec<String> = rounds
            .iter()
            .map(|r| SummaryFields::from_stored(m, r).render())
            .collect();
        let vectors = embedder.embed_batch(&summaries).await?;
        if vectors.len() != summaries.len() {
            return Err(Error::Embedding(format!(
                "expected {} embeddings, got {}",
                summaries.len(),
                vectors.len()
            )));
        }
        let updates: Vec<(i64, String, StoredEmbedding)> = rounds
            .iter()
            .zip(summaries)
            .zip(vectors)
            .map(|((round, summary), vector)| {
                let embedding = StoredEmbedding {
                    version: version.clone(),
                    vector,
                };
                (round.id, summary, embedding)
            })
            .collect();
        store.update_round_summaries(&updates)?;
        report.matches += 1;
        report.rounds += rounds.len();
    }

    info!("Reindexed {} rounds", report.rounds);
    Ok(report)
}
