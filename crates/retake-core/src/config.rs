//! Configuration and data directory management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Which embedding backend produces round and query vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackendKind {
    /// Local deterministic feature-hashing embedder.
    Hash,
    /// OpenAI-compatible remote embeddings endpoint.
    Http,
}

/// Top-level Retake configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetakeConfig {
    /// HTTP server port.
    pub port: u16,
    /// Root data directory; holds `retake.db`.
    pub data_dir: PathBuf,
    /// Value clients must send in `X-API-Key`.
    pub api_key: String,
    /// Base URL tournament pages are fetched from.
    pub source_base_url: String,
    /// Upper bound on concurrently extracted series per ingest run.
    pub ingest_workers: usize,
    /// Attempts per page fetch, including the first.
    pub fetch_attempts: u32,
    /// Initial retry backoff; doubled per attempt and capped at `fetch_max_backoff`.
    pub fetch_backoff: Duration,
    pub fetch_max_backoff: Duration,
    pub fetch_timeout: Duration,
    pub embedding_backend: EmbeddingBackendKind,
    pub embedding_url: Option<String>,
    pub embedding_model: String,
    /// Embedding dimension (384 by default).
    pub embedding_dim: usize,
    /// Upper clamp on `n_results` for a query.
    pub max_results: usize,
    /// Cosine distance above which query hits are dropped; unset keeps all.
    pub max_distance: Option<f64>,
}

impl RetakeConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> Result<Self> {
        Self::from_lookup(data_dir, |key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup<F>(data_dir: impl AsRef<Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;

        let embedding_backend = match lookup("EMBEDDING_BACKEND").as_deref() {
            None | Some("hash") => EmbeddingBackendKind::Hash,
            Some("http") => EmbeddingBackendKind::Http,
            Some(other) => {
                return Err(Error::Config(format!(
                    "EMBEDDING_BACKEND must be 'hash' or 'http', got '{}'",
                    other
                )))
            }
        };
        let embedding_url = lookup("EMBEDDING_URL");
        if embedding_backend == EmbeddingBackendKind::Http && embedding_url.is_none() {
            return Err(Error::Config(
                "EMBEDDING_URL is required when EMBEDDING_BACKEND=http".into(),
            ));
        }

        let ingest_workers: usize = parse_var(&lookup, "INGEST_WORKERS", 4)?;
        let fetch_attempts: u32 = parse_var(&lookup, "FETCH_ATTEMPTS", 3)?;
        let embedding_dim: usize = parse_var(&lookup, "EMBEDDING_DIM", 384)?;
        let max_results: usize = parse_var(&lookup, "MAX_RESULTS", 50)?;
        if ingest_workers == 0 || fetch_attempts == 0 || embedding_dim == 0 || max_results == 0 {
            return Err(Error::Config(
                "INGEST_WORKERS, FETCH_ATTEMPTS, EMBEDDING_DIM and MAX_RESULTS must be positive"
                    .into(),
            ));
        }

        let max_distance = match lookup("MAX_DISTANCE") {
            Some(raw) => {
                let value: f64 = raw.trim().parse().map_err(|_| {
                    Error::Config(format!("MAX_DISTANCE has invalid value '{}'", raw))
                })?;
                if !(0.0..=2.0).contains(&value) {
                    return Err(Error::Config(format!(
                        "MAX_DISTANCE must be between 0 and 2, got {}",
                        value
                    )));
                }
                Some(value)
            }
            None => None,
        };

        Ok(Self {
            port: parse_var(&lookup, "PORT", 8000)?,
            data_dir,
            api_key: lookup("API_KEY").unwrap_or_else(|| "dev_key".to_string()),
            source_base_url: lookup("RIB_BASE_URL")
                .unwrap_or_else(|| "https://rib.gg".to_string())
                .trim_end_matches('/')
                .to_string(),
            ingest_workers,
            fetch_attempts,
            fetch_backoff: Duration::from_millis(parse_var(&lookup, "FETCH_BACKOFF_MS", 2000)?),
            fetch_max_backoff: Duration::from_secs(10),
            fetch_timeout: Duration::from_secs(parse_var(&lookup, "FETCH_TIMEOUT_SECS", 10)?),
            embedding_backend,
            embedding_url,
            embedding_model: lookup("EMBEDDING_MODEL")
                .unwrap_or_else(|| "text-embedding-004".to_string()),
            embedding_dim,
            max_results,
            max_distance,
        })
    }

    /// Path of the SQLite database file.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("retake.db")
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} has invalid value '{}'", key, raw))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let dir = std::env::temp_dir().join("retake-config-defaults");
        let vars = env(&[]);
        let config = RetakeConfig::from_lookup(&dir, |k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.api_key, "dev_key");
        assert_eq!(config.source_base_url, "https://rib.gg");
        assert_eq!(config.ingest_workers, 4);
        assert_eq!(config.fetch_attempts, 3);
        assert_eq!(config.embedding_backend, EmbeddingBackendKind::Hash);
        assert_eq!(config.embedding_dim, 384);
        assert_eq!(config.max_distance, None);
        assert_eq!(config.db_path(), dir.join("retake.db"));
    }

    #[test]
    fn test_overrides() {
        let dir = std::env::temp_dir().join("retake-config-overrides");
        let vars = env(&[
            ("PORT", "9001"),
            ("API_KEY", "secret"),
            ("RIB_BASE_URL", "http://localhost:1234/"),
            ("EMBEDDING_BACKEND", "http"),
            ("EMBEDDING_URL", "http://localhost:8080"),
            ("FETCH_BACKOFF_MS", "5"),
            ("MAX_DISTANCE", "0.6"),
        ]);
        let config = RetakeConfig::from_lookup(&dir, |k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.port, 9001);
        assert_eq!(config.api_key, "secret");
        assert_eq!(config.source_base_url, "http://localhost:1234");
        assert_eq!(config.embedding_backend, EmbeddingBackendKind::Http);
        assert_eq!(config.fetch_backoff, Duration::from_millis(5));
        assert_eq!(config.max_distance, Some(0.6));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = std::env::temp_dir().join("retake-config-invalid");
        let vars = env(&[("PORT", "not-a-port")]);
        let err = RetakeConfig::from_lookup(&dir, |k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let vars = env(&[("EMBEDDING_BACKEND", "http")]);
        let err = RetakeConfig::from_lookup(&dir, |k| vars.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains("EMBEDDING_URL"));

        let vars = env(&[("INGEST_WORKERS", "0")]);
        assert!(RetakeConfig::from_lookup(&dir, |k| vars.get(k).cloned()).is_err());

        for bad in ["close", "-0.1", "2.5"] {
            let vars = env(&[("MAX_DISTANCE", bad)]);
            let err = RetakeConfig::from_lookup(&dir, |k| vars.get(k).cloned()).unwrap_err();
            assert!(err.to_string().contains("MAX_DISTANCE"), "{bad}");
        }
    }
}
