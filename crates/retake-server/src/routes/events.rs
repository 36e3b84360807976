//! Event listing.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;
use retake_store::Event;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events", get(list_events))
        .route("/events/{id}", get(get_event))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EventSummary {
    pub id: String,
    pub name: String,
}

/// GET /api/v1/events — `[{id, name}]` in ingestion order.
async fn list_events(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<EventSummary>>, ApiError> {
    let events = state
        .store
        .list_events()?
        .into_iter()
        .map(|e| EventSummary {
            id: e.id,
            name: e.name,
        })
        .collect();
    Ok(Json(events))
}

async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Event>, ApiError> {
    Ok(Json(state.store.get_event(&id)?))
}
