//! Cosine-distance index over normalised round embeddings.

use std::collections::HashMap;

use ndarray::Array1;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::filters::{EntryMetadata, IndexFilters};
use retake_core::{Error, Result};
use retake_store::{IndexableRound, StoredEmbedding};

/// A ranked candidate: lower distance = more similar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub round_id: i64,
    /// Cosine distance in `[0, 2]`.
    pub distance: f32,
}

/// Convert a cosine distance into the percentage shown to clients.
///
/// `round((1 - distance) * 100)` with halves rounded towards positive infinity.
pub fn similarity_percent(distance: f64) -> i64 {
    ((1.0 - distance) * 100.0 + 0.5).floor() as i64
}

struct Entry {
    round_id: i64,
    /// Insertion sequence; larger = more recently ingested.
    seq: u64,
    vector: Array1<f32>,
    meta: EntryMetadata,
}

#[derive(Default)]
struct IndexInner {
    entries: Vec<Entry>,
    positions: HashMap<i64, usize>,
    next_seq: u64,
}

impl IndexInner {
    fn upsert(&mut self, round_id: i64, vector: Array1<f32>, meta: EntryMetadata) {
        match self.positions.get(&round_id) {
            Some(&pos) => {
                let entry = &mut self.entries[pos];
                entry.vector = vector;
                entry.meta = meta;
            }
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.positions.insert(round_id, self.entries.len());
                self.entries.push(Entry {
                    round_id,
                    seq,
                    vector,
                    meta,
                });
            }
        }
    }
}

/// Semantic index pinned to a single embedding version and dimension.
///
/// Batch inserts take the write lock once, so a concurrent search sees
/// either none or all of a committed match's rounds.
pub struct SemanticIndex {
    version: String,
    dim: usize,
    inner: RwLock<IndexInner>,
}

impl SemanticIndex {
    pub fn new(version: impl Into<String>, dim: usize) -> Self {
        Self {
            version: version.into(),
            dim,
            inner: RwLock::new(IndexInner::default()),
        }
    }

    /// Build an index from stored rounds, rejecting any foreign embedding version.
    pub fn load(version: impl Into<String>, dim: usize, rounds: &[IndexableRound]) -> Result<Self> {
        let index = Self::new(version, dim);
        let items: Vec<(i64, &StoredEmbedding, EntryMetadata)> = rounds
            .iter()
            .map(|r| {
                (
                    r.round.id,
                    &r.embedding,
                    EntryMetadata::from_round(&r.match_info, &r.round),
                )
            })
            .collect();
        index.insert_batch(items)?;
        info!(
            "Semantic index loaded: {} entries, version={}, dim={}",
            index.len(),
            index.version,
            index.dim
        );
        Ok(index)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn contains(&self, round_id: i64) -> bool {
        self.inner.read().positions.contains_key(&round_id)
    }

    fn check(&self, embedding: &StoredEmbedding) -> Result<()> {
        if embedding.version != self.version {
            return Err(Error::EmbeddingMismatch(format!(
                "index holds '{}' vectors, got '{}'",
                self.version, embedding.version
            )));
        }
        if embedding.vector.len() != self.dim {
            return Err(Error::EmbeddingMismatch(format!(
                "index dimension is {}, got {}",
                self.dim,
                embedding.vector.len()
            )));
        }
        Ok(())
    }

    /// Insert or replace the entry for a round.
    pub fn insert(&self, round_id: i64, embedding: &StoredEmbedding, meta: EntryMetadata) -> Result<()> {
        self.insert_batch(vec![(round_id, embedding, meta)])
    }

    /// Insert several entries atomically; nothing is inserted if any is rejected.
    pub fn insert_batch(&self, items: Vec<(i64, &StoredEmbedding, EntryMetadata)>) -> Result<()> {
        for (_, embedding, _) in &items {
            self.check(embedding)?;
        }
        let prepared: Vec<(i64, Array1<f32>, EntryMetadata)> = items
            .into_iter()
            .map(|(id, embedding, meta)| (id, normalize(&embedding.vector), meta))
            .collect();

        let mut inner = self.inner.write();
        for (id, vector, meta) in prepared {
            inner.upsert(id, vector, meta);
        }
        Ok(())
    }

    /// Drop a round's entry. Returns whether it was present.
    pub fn remove(&self, round_id: i64) -> bool {
        let mut inner = self.inner.write();
        let Some(pos) = inner.positions.remove(&round_id) else {
            return false;
        };
        inner.entries.swap_remove(pos);
        if pos < inner.entries.len() {
            let moved = inner.entries[pos].round_id;
            inner.positions.insert(moved, pos);
        }
        true
    }

    /// The `k` nearest entries passing `filters`, by ascending cosine distance.
    ///
    /// Ties are broken by most recent insertion first.
    pub fn search(
        &self,
        query: &StoredEmbedding,
        k: usize,
        filters: &IndexFilters,
    ) -> Result<Vec<SearchHit>> {
        self.search_all(query, k, std::slice::from_ref(filters))
    }

    /// Like `search`, but an entry must pass every filter set.
    pub fn search_all(
        &self,
        query: &StoredEmbedding,
        k: usize,
        filters: &[IndexFilters],
    ) -> Result<Vec<SearchHit>> {
        self.check(query)?;
        if k == 0 {
            return Ok(Vec::new());
        }
        let q = normalize(&query.vector);

        let inner = self.inner.read();
        let mut scored: Vec<(f32, u64, i64)> = inner
            .entries
            .iter()
            .filter(|e| filters.iter().all(|f| f.matches(&e.meta)))
            .map(|e| {
                let distance = (1.0 - e.vector.dot(&q)).clamp(0.0, 2.0);
                (distance, e.seq, e.round_id)
            })
            .collect();
        drop(inner);

        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| b.1.cmp(&a.1)));
        scored.truncate(k);
        debug!("Index search returned {} hits (k={})", scored.len(), k);

        Ok(scored
            .into_iter()
            .map(|(distance, _, round_id)| SearchHit { round_id, distance })
            .collect())
    }
}

fn normalize(vector: &[f32]) -> Array1<f32> {
    let v = Array1::from_vec(vector.to_vec());
    let norm = v.dot(&v).sqrt();
    if norm > 1e-9 {
        v / norm
    } else {
        v
    }
}
