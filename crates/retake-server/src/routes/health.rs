//! Health and storage counters.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}

/// GET /api/v1/health
async fn health(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, ApiError> {
    let stats = state.store.stats()?;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "events": stats.events,
        "matches": stats.matches,
        "rounds": stats.rounds,
        "embeddings": stats.embeddings,
        "indexed": state.index.len(),
        "embedding_version": state.index.version(),
        "embedding_dim": state.index.dimension(),
    })))
}
