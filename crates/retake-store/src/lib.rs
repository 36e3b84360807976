//! Retake Store — events, matches, rounds and their embeddings in SQLite.

pub mod embedding;
pub mod schema;
pub mod sqlite;
pub mod types;

pub use sqlite::SqliteStore;
pub use types::*;
