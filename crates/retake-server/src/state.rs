//! Shared application state.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use retake_core::{RetakeConfig, Result};
use retake_index::SemanticIndex;
use retake_infer::EmbedderBackend;
use retake_ingest::{IngestionPipeline, PageFetcher};
use retake_resolve::QueryOrchestrator;
use retake_store::SqliteStore;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: RetakeConfig,
    pub store: Arc<SqliteStore>,
    pub index: Arc<SemanticIndex>,
    pub embedder: Arc<dyn EmbedderBackend>,
    pub pipeline: IngestionPipeline,
    pub orchestrator: QueryOrchestrator,
    /// Cancelled on shutdown; ingest runs use child tokens of it.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Load every stored embedding into a fresh index and wire the services.
    ///
    /// Fails with `EmbeddingMismatch` when any stored vector was produced by a
    /// different embedder than the configured one.
    pub fn new(
        config: RetakeConfig,
        store: SqliteStore,
        embedder: Arc<dyn EmbedderBackend>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Result<Self> {
        let store = Arc::new(store);
        let rows = store.indexable_rounds()?;
        let index = Arc::new(SemanticIndex::load(
            embedder.version(),
            embedder.dimension(),
            &rows,
        )?);
        info!("Indexed {} stored rounds", index.len());

        let pipeline = IngestionPipeline::new(
            store.clone(),
            index.clone(),
            embedder.clone(),
            fetcher,
            config.ingest_workers,
        );
        let orchestrator = QueryOrchestrator::new(
            store.clone(),
            index.clone(),
            embedder.clone(),
            config.max_results,
        )
        .with_max_distance(config.max_distance);

        Ok(Self {
            config,
            store,
            index,
            embedder,
            pipeline,
            orchestrator,
            shutdown: CancellationToken::new(),
        })
    }
}
