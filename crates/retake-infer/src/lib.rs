//! Retake Infer — embedding backends and query cache.
//!
//! `EmbedderBackend` abstracts over embedding generation. `HashingEmbedder`
//! runs locally and deterministically; `HttpEmbedder` calls an
//! OpenAI-compatible embeddings endpoint. Every backend reports a version
//! tag that is stored next to each vector it produces.

pub mod cache;
pub mod embedder;
pub mod hashing;
pub mod http;

pub use cache::QueryCache;
pub use embedder::EmbedderBackend;
pub use hashing::HashingEmbedder;
pub use http::HttpEmbedder;

use std::sync::Arc;

use retake_core::{EmbeddingBackendKind, Error, RetakeConfig, Result};

/// Create the embedder selected by configuration.
pub fn create_embedder(config: &RetakeConfig) -> Result<Arc<dyn EmbedderBackend>> {
    let embedder: Arc<dyn EmbedderBackend> = match config.embedding_backend {
        EmbeddingBackendKind::Hash => Arc::new(HashingEmbedder::new(config.embedding_dim)),
        EmbeddingBackendKind::Http => {
            let url = config
                .embedding_url
                .as_deref()
                .ok_or_else(|| Error::Config("EMBEDDING_URL is not set".into()))?;
            Arc::new(HttpEmbedder::new(
                url,
                &config.embedding_model,
                config.embedding_dim,
            )?)
        }
    };
    tracing::info!(
        "Using {} embedder (version={})",
        match config.embedding_backend {
            EmbeddingBackendKind::Hash => "hashing",
            EmbeddingBackendKind::Http => "http",
        },
        embedder.version()
    );
    Ok(embedder)
}
