//! Admin ingestion trigger.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;
use retake_ingest::IngestReport;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/ingest-event", post(ingest_event))
        .route("/admin/ingest-series", post(ingest_series))
}

#[derive(Debug, Deserialize)]
pub struct IngestEventRequest {
    pub event_url: String,
}

#[derive(Debug, Deserialize)]
pub struct IngestSeriesRequest {
    pub series_url: String,
}

/// POST /api/v1/admin/ingest-event — blocks until the run finishes and
/// returns its report (`message` plus counters).
async fn ingest_event(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<IngestEventRequest>, JsonRejection>,
) -> Result<Json<IngestReport>, ApiError> {
    let Json(body) = payload?;
    info!("Ingest requested for {}", body.event_url);
    let cancel = state.shutdown.child_token();
    let report = state.pipeline.ingest(&body.event_url, &cancel).await?;
    Ok(Json(report))
}

/// POST /api/v1/admin/ingest-series — one series, attached to its event.
async fn ingest_series(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<IngestSeriesRequest>, JsonRejection>,
) -> Result<Json<IngestReport>, ApiError> {
    let Json(body) = payload?;
    info!("Series ingest requested for {}", body.series_url);
    let cancel = state.shutdown.child_token();
    let report = state
        .pipeline
        .ingest_series_url(&body.series_url, &cancel)
        .await?;
    Ok(Json(report))
}
