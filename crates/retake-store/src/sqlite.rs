//! SQLite-backed event, match and round store.
//!
//! One connection behind a mutex; every multi-row write runs in a single
//! transaction so readers never observe a half-committed match.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use tracing::{debug, info};

use crate::embedding::{decode_f32, encode_f32};
use crate::schema::SCHEMA_SQL;
use crate::types::*;
use retake_core::{Error, Result};

const ROUND_COLUMNS: &str = "r.id, r.match_id, r.external_id, r.round_num, r.score_a, r.score_b, \
     r.winning_team, r.round_type, r.is_pistol, r.win_condition, r.vod_url, r.vod_timestamp, \
     r.summary_text, r.created_at";
const MATCH_COLUMNS: &str = "m.id, m.event_id, m.external_id, m.series_id, m.team_a, m.team_b, \
     m.map_name, m.date, m.created_at";
const EVENT_COLUMNS: &str = "e.id, e.external_id, e.name, e.source_url, e.ingested_at";

/// SQLite store for events, matches, rounds and round embeddings.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open or create the store at `db_path`.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Storage(e.to_string()))?;
        }

        let conn = Self::create_connection(&db_path)?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
        };
        let stats = store.stats()?;
        info!(
            "SqliteStore initialized: {} events, {} matches, {} rounds, path={}",
            stats.events,
            stats.matches,
            stats.rounds,
            store.db_path.display()
        );
        Ok(store)
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(db_err)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(db_err)?;
        Ok(conn)
    }

    // ---------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------

    /// Register an event. Fails with `Conflict` if `source_url` or `external_id`
    /// was already ingested.
    pub fn create_event(&self, source_url: &str, external_id: &str, name: &str) -> Result<Event> {
        let event = Event {
            id: uuid::Uuid::new_v4().to_string(),
            external_id: external_id.to_string(),
            name: name.to_string(),
            source_url: source_url.to_string(),
            ingested_at: now_millis(),
        };
        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT INTO events (id, external_id, name, source_url, ingested_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .map_err(db_err)?
        .execute(params![
            event.id,
            event.external_id,
            event.name,
            event.source_url,
            event.ingested_at
        ])
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Conflict(format!(
                    "event {} already ingested ({})",
                    external_id, source_url
                ))
            } else {
                db_err(e)
            }
        })?;
        info!("Registered event '{}' ({}) for {}", event.name, event.id, source_url);
        Ok(event)
    }

    pub fn get_event(&self, id: &str) -> Result<Event> {
        let conn = self.conn.lock();
        let event = conn
            .prepare_cached(&format!("SELECT {} FROM events e WHERE e.id = ?1", EVENT_COLUMNS))
            .map_err(db_err)?
            .query_row(params![id], |row| row_to_event(row, 0))
            .optional()
            .map_err(db_err)?;
        event.ok_or_else(|| Error::NotFound(format!("event {}", id)))
    }

    /// Look up the event registered for a canonical source URL.
    pub fn find_event_by_source(&self, source_url: &str) -> Result<Option<Event>> {
        self.find_event_where("e.source_url", source_url)
    }

    /// Look up the event for a source-side event id (the ingest idempotency key).
    pub fn find_event_by_external_id(&self, external_id: &str) -> Result<Option<Event>> {
        self.find_event_where("e.external_id", external_id)
    }

    fn find_event_where(&self, column: &str, value: &str) -> Result<Option<Event>> {
        let conn = self.conn.lock();
        let event = conn
            .prepare_cached(&format!(
                "SELECT {} FROM events e WHERE {} = ?1",
                EVENT_COLUMNS, column
            ))
            .map_err(db_err)?
            .query_row(params![value], |row| row_to_event(row, 0))
            .optional()
            .map_err(db_err)?;
        Ok(event)
    }

    /// All events in insertion order.
    pub fn list_events(&self) -> Result<Vec<Event>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(&format!("SELECT {} FROM events e ORDER BY e.rowid", EVENT_COLUMNS))
            .map_err(db_err)?;
        let rows = stmt.query_map([], |row| row_to_event(row, 0)).map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    /// Delete an event with its matches and rounds. Returns the removed round ids.
    pub fn delete_event(&self, id: &str) -> Result<Vec<i64>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;
        let round_ids: Vec<i64> = {
            let mut stmt = tx
                .prepare(
                    "SELECT r.id FROM rounds r JOIN matches m ON m.id = r.match_id \
                     WHERE m.event_id = ?1 ORDER BY r.id",
                )
                .map_err(db_err)?;
            let rows = stmt.query_map(params![id], |row| row.get(0)).map_err(db_err)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)?
        };
        let count = tx
            .execute("DELETE FROM events WHERE id = ?1", params![id])
            .map_err(db_err)?;
        if count == 0 {
            return Err(Error::NotFound(format!("event {}", id)));
        }
        tx.commit().map_err(db_err)?;
        info!("Deleted event {} and {} rounds", id, round_ids.len());
        Ok(round_ids)
    }

    // ---------------------------------------------------------------
    // Matches
    // ---------------------------------------------------------------

    /// Whether a match with this source id is already stored under the event.
    pub fn match_exists(&self, event_id: &str, external_id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let found: Option<i64> = conn
            .prepare_cached("SELECT id FROM matches WHERE event_id = ?1 AND external_id = ?2")
            .map_err(db_err)?
            .query_row(params![event_id, external_id], |row| row.get(0))
            .optional()
            .map_err(db_err)?;
        Ok(found.is_some())
    }

    pub fn get_match(&self, id: i64) -> Result<Match> {
        let conn = self.conn.lock();
        let found = conn
            .prepare_cached(&format!("SELECT {} FROM matches m WHERE m.id = ?1", MATCH_COLUMNS))
            .map_err(db_err)?
            .query_row(params![id], |row| row_to_match(row, 0))
            .optional()
            .map_err(db_err)?;
        found.ok_or_else(|| Error::NotFound(format!("match {}", id)))
    }

    /// Insert a match and all its rounds in one transaction.
    ///
    /// Fails with `Conflict` if `(event_id, external_id)` already exists; any
    /// round failure rolls the whole match back.
    pub fn commit_match(
        &self,
        event_id: &str,
        new_match: &NewMatch,
        rounds: &[NewRound],
    ) -> Result<(Match, Vec<Round>)> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;

        let created_at = now_millis();
        let match_id = tx
            .prepare_cached(
                "INSERT INTO matches (event_id, external_id, series_id, team_a, team_b, \
                 map_name, date, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .map_err(db_err)?
            .insert(params![
                event_id,
                new_match.external_id,
                new_match.series_id,
                new_match.team_a,
                new_match.team_b,
                new_match.map_name,
                new_match.date,
                created_at,
            ])
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Error::Conflict(format!(
                        "match {} already exists in event {}",
                        new_match.external_id, event_id
                    ))
                } else {
                    db_err(e)
                }
            })?;

        let mut stored = Vec::with_capacity(rounds.len());
        for round in rounds {
            stored.push(insert_round(&tx, match_id, round)?);
        }
        tx.commit().map_err(db_err)?;

        debug!(
            "Committed match {} ({}) with {} rounds",
            match_id,
            new_match.external_id,
            stored.len()
        );
        let stored_match = Match {
            id: match_id,
            event_id: event_id.to_string(),
            external_id: new_match.external_id.clone(),
            series_id: new_match.series_id.clone(),
            team_a: new_match.team_a.clone(),
            team_b: new_match.team_b.clone(),
            map_name: new_match.map_name.clone(),
            date: new_match.date.clone(),
            created_at,
        };
        Ok((stored_match, stored))
    }

    // ---------------------------------------------------------------
    // Rounds
    // ---------------------------------------------------------------

    /// Insert a single round under an existing match.
    pub fn add_round(&self, match_id: i64, round: &NewRound) -> Result<Round> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;
        let exists: Option<i64> = tx
            .query_row("SELECT id FROM matches WHERE id = ?1", params![match_id], |row| {
                row.get(0)
            })
            .optional()
            .map_err(db_err)?;
        if exists.is_none() {
            return Err(Error::NotFound(format!("match {}", match_id)));
        }
        let stored = insert_round(&tx, match_id, round)?;
        tx.commit().map_err(db_err)?;
        Ok(stored)
    }

    pub fn find_round(&self, id: i64) -> Result<Round> {
        let conn = self.conn.lock();
        let round = conn
            .prepare_cached(&format!("SELECT {} FROM rounds r WHERE r.id = ?1", ROUND_COLUMNS))
            .map_err(db_err)?
            .query_row(params![id], |row| row_to_round(row, 0))
            .optional()
            .map_err(db_err)?;
        round.ok_or_else(|| Error::NotFound(format!("round {}", id)))
    }

    /// All rounds of a match ordered by round number.
    pub fn rounds_for_match(&self, match_id: i64) -> Result<Vec<Round>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(&format!(
                "SELECT {} FROM rounds r WHERE r.match_id = ?1 ORDER BY r.round_num",
                ROUND_COLUMNS
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![match_id], |row| row_to_round(row, 0))
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    /// Load a round with its parent match and event.
    pub fn hydrate_round(&self, id: i64) -> Result<HydratedRound> {
        let round_cols = ROUND_COLUMNS.split(',').count();
        let match_cols = MATCH_COLUMNS.split(',').count();
        let conn = self.conn.lock();
        let hydrated = conn
            .prepare_cached(&format!(
                "SELECT {}, {}, {} FROM rounds r \
                 JOIN matches m ON m.id = r.match_id \
                 JOIN events e ON e.id = m.event_id \
                 WHERE r.id = ?1",
                ROUND_COLUMNS, MATCH_COLUMNS, EVENT_COLUMNS
            ))
            .map_err(db_err)?
            .query_row(params![id], |row| {
                Ok(HydratedRound {
                    round: row_to_round(row, 0)?,
                    match_info: row_to_match(row, round_cols)?,
                    event: row_to_event(row, round_cols + match_cols)?,
                })
            })
            .optional()
            .map_err(db_err)?;
        hydrated.ok_or_else(|| Error::NotFound(format!("round {}", id)))
    }

    /// Every round that has an embedding, with its match, in round id order.
    pub fn indexable_rounds(&self) -> Result<Vec<IndexableRound>> {
        let round_cols = ROUND_COLUMNS.split(',').count();
        let match_cols = MATCH_COLUMNS.split(',').count();
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {}, {}, re.version, re.embedding FROM rounds r \
                 JOIN matches m ON m.id = r.match_id \
                 JOIN round_embeddings re ON re.round_id = r.id \
                 ORDER BY r.id",
                ROUND_COLUMNS, MATCH_COLUMNS
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| {
                let version: String = row.get(round_cols + match_cols)?;
                let blob: Vec<u8> = row.get(round_cols + match_cols + 1)?;
                Ok((row_to_round(row, 0)?, row_to_match(row, round_cols)?, version, blob))
            })
            .map_err(db_err)?;

        let mut out = Vec::new();
        for row in rows {
            let (round, match_info, version, blob) = row.map_err(db_err)?;
            out.push(IndexableRound {
                round,
                match_info,
                embedding: StoredEmbedding {
                    version,
                    vector: decode_f32(&blob)?,
                },
            });
        }
        Ok(out)
    }

    /// Every round with its match, in round id order, regardless of embedding state.
    pub fn all_rounds(&self) -> Result<Vec<(Match, Round)>> {
        let round_cols = ROUND_COLUMNS.split(',').count();
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {}, {} FROM rounds r JOIN matches m ON m.id = r.match_id ORDER BY r.id",
                ROUND_COLUMNS, MATCH_COLUMNS
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| Ok((row_to_match(row, round_cols)?, row_to_round(row, 0)?)))
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    /// Replace round summaries together with the embeddings derived from
    /// them, all in one transaction. An unknown round id rolls back every
    /// update in the batch.
    pub fn update_round_summaries(&self, updates: &[(i64, String, StoredEmbedding)]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;
        for (round_id, summary_text, embedding) in updates {
            let count = tx
                .execute(
                    "UPDATE rounds SET summary_text = ?1 WHERE id = ?2",
                    params![summary_text, round_id],
                )
                .map_err(db_err)?;
            if count == 0 {
                return Err(Error::NotFound(format!("round {}", round_id)));
            }
            upsert_embedding(&tx, *round_id, embedding)?;
        }
        tx.commit().map_err(db_err)?;
        Ok(())
    }

    pub fn embedding_versions(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT DISTINCT version FROM round_embeddings ORDER BY version")
            .map_err(db_err)?;
        let rows = stmt.query_map([], |row| row.get(0)).map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<String>>>().map_err(db_err)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let count = |table: &str| -> Result<i64> {
            let conn = self.conn.lock();
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
                .map_err(db_err)
        };
        Ok(StoreStats {
            events: count("events")?,
            matches: count("matches")?,
            rounds: count("rounds")?,
            embeddings: count("round_embeddings")?,
            embedding_versions: self.embedding_versions()?,
            db_path: self.db_path.display().to_string(),
        })
    }
}

fn insert_round(tx: &Transaction<'_>, match_id: i64, round: &NewRound) -> Result<Round> {
    let created_at = now_millis();
    let id = tx
        .prepare_cached(
            "INSERT INTO rounds (match_id, external_id, round_num, score_a, score_b, \
             winning_team, round_type, is_pistol, win_condition, vod_url, vod_timestamp, \
             summary_text, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )
        .map_err(db_err)?
        .insert(params![
            match_id,
            round.external_id,
            round.round_num,
            round.score_a,
            round.score_b,
            round.winning_team,
            round.round_type.as_str(),
            round.is_pistol,
            round.win_condition,
            round.vod_url,
            round.vod_timestamp,
            round.summary_text,
            created_at,
        ])
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Database(format!(
                    "duplicate round {} in match {}",
                    round.round_num, match_id
                ))
            } else {
                db_err(e)
            }
        })?;

    if let Some(embedding) = &round.embedding {
        upsert_embedding(tx, id, embedding)?;
    }

    Ok(Round {
        id,
        match_id,
        external_id: round.external_id.clone(),
        round_num: round.round_num,
        score_a: round.score_a,
        score_b: round.score_b,
        winning_team: round.winning_team.clone(),
        round_type: round.round_type,
        is_pistol: round.is_pistol,
        win_condition: round.win_condition.clone(),
        vod_url: round.vod_url.clone(),
        vod_timestamp: round.vod_timestamp,
        summary_text: round.summary_text.clone(),
        created_at,
    })
}

fn upsert_embedding(tx: &Transaction<'_>, round_id: i64, embedding: &StoredEmbedding) -> Result<()> {
    tx.execute(
        "INSERT OR REPLACE INTO round_embeddings (round_id, version, dim, embedding) \
         VALUES (?1, ?2, ?3, ?4)",
        params![
            round_id,
            embedding.version,
            embedding.vector.len() as i64,
            encode_f32(&embedding.vector)
        ],
    )
    .map_err(db_err)?;
    Ok(())
}

fn row_to_event(row: &Row<'_>, base: usize) -> rusqlite::Result<Event> {
    Ok(Event {
        id: row.get(base)?,
        external_id: row.get(base + 1)?,
        name: row.get(base + 2)?,
        source_url: row.get(base + 3)?,
        ingested_at: row.get(base + 4)?,
    })
}

fn row_to_match(row: &Row<'_>, base: usize) -> rusqlite::Result<Match> {
    Ok(Match {
        id: row.get(base)?,
        event_id: row.get(base + 1)?,
        external_id: row.get(base + 2)?,
        series_id: row.get(base + 3)?,
        team_a: row.get(base + 4)?,
        team_b: row.get(base + 5)?,
        map_name: row.get(base + 6)?,
        date: row.get(base + 7)?,
        created_at: row.get(base + 8)?,
    })
}

fn row_to_round(row: &Row<'_>, base: usize) -> rusqlite::Result<Round> {
    let round_type: String = row.get(base + 7)?;
    Ok(Round {
        id: row.get(base)?,
        match_id: row.get(base + 1)?,
        external_id: row.get(base + 2)?,
        round_num: row.get(base + 3)?,
        score_a: row.get(base + 4)?,
        score_b: row.get(base + 5)?,
        winning_team: row.get(base + 6)?,
        round_type: round_type.parse().unwrap_or(RoundType::Default),
        is_pistol: row.get(base + 8)?,
        win_condition: row.get(base + 9)?,
        vod_url: row.get(base + 10)?,
        vod_timestamp: row.get(base + 11)?,
        summary_text: row.get(base + 12)?,
        created_at: row.get(base + 13)?,
    })
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn db_err(e: rusqlite::Error) -> Error {
    Error::Database(e.to_string())
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (SqliteStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path().join("retake.db")).unwrap();
        (store, dir)
    }

    fn new_match(external_id: &str) -> NewMatch {
        NewMatch {
            external_id: external_id.into(),
            series_id: "900".into(),
            team_a: "Paper Rex".into(),
            team_b: "Fnatic".into(),
            map_name: "Haven".into(),
            date: Some("2025-09-12".into()),
        }
    }

    fn new_round(num: i32) -> NewRound {
        NewRound {
            external_id: format!("r{}", num),
            round_num: num,
            score_a: num - 1,
            score_b: 0,
            winning_team: "Paper Rex".into(),
            round_type: RoundType::Default,
            is_pistol: num == 1,
            win_condition: Some("elimination".into()),
            vod_url: None,
            vod_timestamp: Some(100 + num as i64),
            summary_text: format!("Round {} summary", num),
            embedding: Some(StoredEmbedding {
                version: "test-v1".into(),
                vector: vec![num as f32, 1.0, 0.0],
            }),
        }
    }

    #[test]
    fn test_create_and_get_event() {
        let (store, _dir) = test_store();
        let event = store
            .create_event("https://rib.gg/events/123", "123", "Champions")
            .unwrap();
        let fetched = store.get_event(&event.id).unwrap();
        assert_eq!(fetched, event);
        assert_eq!(
            store.find_event_by_source("https://rib.gg/events/123").unwrap(),
            Some(event)
        );
    }

    #[test]
    fn test_duplicate_event_url_conflicts() {
        let (store, _dir) = test_store();
        store.create_event("https://rib.gg/events/1", "1", "A").unwrap();
        let err = store
            .create_event("https://rib.gg/events/1", "1", "A again")
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(store.list_events().unwrap().len(), 1);
    }

    #[test]
    fn test_same_external_id_under_another_url_conflicts() {
        let (store, _dir) = test_store();
        let event = store.create_event("https://rib.gg/events/9", "9", "A").unwrap();
        let err = store
            .create_event("https://rib.gg/events/masters/9", "9", "A")
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(store.find_event_by_external_id("9").unwrap(), Some(event));
        assert_eq!(store.find_event_by_external_id("10").unwrap(), None);
    }

    #[test]
    fn test_unknown_ids_are_not_found() {
        let (store, _dir) = test_store();
        assert!(matches!(store.get_event("nope"), Err(Error::NotFound(_))));
        assert!(matches!(store.find_round(42), Err(Error::NotFound(_))));
        assert!(matches!(store.hydrate_round(42), Err(Error::NotFound(_))));
        assert!(matches!(
            store.add_round(7, &new_round(1)),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_list_events_in_insertion_order() {
        let (store, _dir) = test_store();
        let names = ["Zeta", "Alpha", "Mid"];
        for (i, name) in names.iter().enumerate() {
            store
                .create_event(&format!("https://rib.gg/events/{}", i), &i.to_string(), name)
                .unwrap();
        }
        let listed: Vec<String> = store.list_events().unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(listed, names);
    }

    #[test]
    fn test_commit_match_and_hydrate() {
        let (store, _dir) = test_store();
        let event = store.create_event("https://rib.gg/events/5", "5", "E").unwrap();
        let rounds: Vec<NewRound> = (1..=3).map(new_round).collect();
        let (m, stored) = store.commit_match(&event.id, &new_match("m1"), &rounds).unwrap();
        assert_eq!(stored.len(), 3);
        assert!(store.match_exists(&event.id, "m1").unwrap());
        assert!(!store.match_exists(&event.id, "m2").unwrap());

        let hydrated = store.hydrate_round(stored[1].id).unwrap();
        assert_eq!(hydrated.round.round_num, 2);
        assert_eq!(hydrated.match_info, m);
        assert_eq!(hydrated.event.id, event.id);

        let indexable = store.indexable_rounds().unwrap();
        assert_eq!(indexable.len(), 3);
        assert_eq!(indexable[0].embedding.vector, vec![1.0, 1.0, 0.0]);
        assert_eq!(store.embedding_versions().unwrap(), vec!["test-v1".to_string()]);
    }

    #[test]
    fn test_duplicate_match_conflicts() {
        let (store, _dir) = test_store();
        let event = store.create_event("https://rib.gg/events/5", "5", "E").unwrap();
        store.commit_match(&event.id, &new_match("m1"), &[new_round(1)]).unwrap();
        let err = store
            .commit_match(&event.id, &new_match("m1"), &[new_round(1)])
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(store.stats().unwrap().rounds, 1);
    }

    #[test]
    fn test_failed_round_rolls_back_whole_match() {
        let (store, _dir) = test_store();
        let event = store.create_event("https://rib.gg/events/5", "5", "E").unwrap();
        // Round 2 appears twice, so the third insert violates the per-match uniqueness.
        let rounds = vec![new_round(1), new_round(2), new_round(2), new_round(3)];
        let err = store
            .commit_match(&event.id, &new_match("m1"), &rounds)
            .unwrap_err();
        assert!(matches!(err, Error::Database(_)));

        let stats = store.stats().unwrap();
        assert_eq!(stats.matches, 0);
        assert_eq!(stats.rounds, 0);
        assert_eq!(stats.embeddings, 0);
        assert!(!store.match_exists(&event.id, "m1").unwrap());
    }

    #[test]
    fn test_add_round_to_existing_match() {
        let (store, _dir) = test_store();
        let event = store.create_event("https://rib.gg/events/5", "5", "E").unwrap();
        let (m, _) = store.commit_match(&event.id, &new_match("m1"), &[new_round(1)]).unwrap();
        let added = store.add_round(m.id, &new_round(2)).unwrap();
        assert_eq!(store.find_round(added.id).unwrap(), added);
        let nums: Vec<i32> = store
            .rounds_for_match(m.id)
            .unwrap()
            .iter()
            .map(|r| r.round_num)
            .collect();
        assert_eq!(nums, vec![1, 2]);
        assert!(store.add_round(m.id, &new_round(2)).is_err());
    }

    #[test]
    fn test_update_round_summaries_replaces_embedding() {
        let (store, _dir) = test_store();
        let event = store.create_event("https://rib.gg/events/5", "5", "E").unwrap();
        let (_, stored) = store
            .commit_match(&event.id, &new_match("m1"), &[new_round(1), new_round(2)])
            .unwrap();
        let fresh = StoredEmbedding {
            version: "test-v2".into(),
            vector: vec![0.0, 0.0, 1.0],
        };
        let updates: Vec<_> = stored
            .iter()
            .map(|r| (r.id, format!("New summary {}", r.round_num), fresh.clone()))
            .collect();
        store.update_round_summaries(&updates).unwrap();

        assert_eq!(store.find_round(stored[0].id).unwrap().summary_text, "New summary 1");
        assert_eq!(store.find_round(stored[1].id).unwrap().summary_text, "New summary 2");
        let indexable = store.indexable_rounds().unwrap();
        assert!(indexable.iter().all(|r| r.embedding == fresh));
        assert_eq!(store.embedding_versions().unwrap(), vec!["test-v2".to_string()]);
    }

    #[test]
    fn test_update_round_summaries_is_all_or_nothing() {
        let (store, _dir) = test_store();
        let event = store.create_event("https://rib.gg/events/5", "5", "E").unwrap();
        let (_, stored) = store.commit_match(&event.id, &new_match("m1"), &[new_round(1)]).unwrap();
        let before = store.find_round(stored[0].id).unwrap().summary_text;
        let fresh = StoredEmbedding {
            version: "test-v2".into(),
            vector: vec![0.0, 0.0, 1.0],
        };

        let err = store
            .update_round_summaries(&[
                (stored[0].id, "Rewritten".into(), fresh.clone()),
                (stored[0].id + 1000, "Missing".into(), fresh),
            ])
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(store.find_round(stored[0].id).unwrap().summary_text, before);
        assert_eq!(store.embedding_versions().unwrap(), vec!["test-v1".to_string()]);
    }

    #[test]
    fn test_delete_event_cascades() {
        let (store, _dir) = test_store();
        let event = store.create_event("https://rib.gg/events/5", "5", "E").unwrap();
        let (_, stored) = store
            .commit_match(&event.id, &new_match("m1"), &[new_round(1), new_round(2)])
            .unwrap();

        let removed = store.delete_event(&event.id).unwrap();
        assert_eq!(removed, stored.iter().map(|r| r.id).collect::<Vec<_>>());

        let stats = store.stats().unwrap();
        assert_eq!((stats.events, stats.matches, stats.rounds, stats.embeddings), (0, 0, 0, 0));
        assert!(matches!(store.delete_event(&event.id), Err(Error::NotFound(_))));
    }
}
