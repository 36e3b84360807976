//! Natural-language round search.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};

use crate::error::ApiError;
use crate::state::AppState;
use retake_resolve::{QueryRequest, QueryResponse};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/query", post(query))
}

/// POST /api/v1/query — no candidates is `200` with `results: []`.
async fn query(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let Json(request) = payload?;
    let response = state.orchestrator.query(&request).await?;
    Ok(Json(response))
}
