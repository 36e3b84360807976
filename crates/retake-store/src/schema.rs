//! Database schema SQL.

/// Events own matches, matches own rounds, rounds own one embedding row.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS events (
    id TEXT PRIMARY KEY,
    external_id TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    source_url TEXT NOT NULL UNIQUE,
    ingested_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS matches (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
    external_id TEXT NOT NULL,
    series_id TEXT NOT NULL,
    team_a TEXT NOT NULL,
    team_b TEXT NOT NULL,
    map_name TEXT NOT NULL,
    date TEXT,
    created_at INTEGER NOT NULL,
    UNIQUE (event_id, external_id)
);

CREATE TABLE IF NOT EXISTS rounds (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    match_id INTEGER NOT NULL REFERENCES matches(id) ON DELETE CASCADE,
    external_id TEXT NOT NULL,
    round_num INTEGER NOT NULL,
    score_a INTEGER NOT NULL,
    score_b INTEGER NOT NULL,
    winning_team TEXT NOT NULL,
    round_type TEXT NOT NULL,
    is_pistol INTEGER NOT NULL DEFAULT 0,
    win_condition TEXT,
    vod_url TEXT,
    vod_timestamp INTEGER,
    summary_text TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    UNIQUE (match_id, round_num)
);

CREATE INDEX IF NOT EXISTS idx_matches_event_id ON matches(event_id);
CREATE INDEX IF NOT EXISTS idx_rounds_match_id ON rounds(match_id);
CREATE INDEX IF NOT EXISTS idx_rounds_external_id ON rounds(external_id);

CREATE TABLE IF NOT EXISTS round_embeddings (
    round_id INTEGER PRIMARY KEY REFERENCES rounds(id) ON DELETE CASCADE,
    version TEXT NOT NULL,
    dim INTEGER NOT NULL,
    embedding BLOB NOT NULL
);
"#;
