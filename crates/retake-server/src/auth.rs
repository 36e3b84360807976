//! `X-API-Key` check, run before any handler.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;
use retake_core::Error;

pub const API_KEY_HEADER: &str = "x-api-key";

pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    match provided {
        Some(key) if keys_match(&key, &state.config.api_key) => Ok(next.run(request).await),
        Some(_) => {
            warn!("Rejected request to {} with invalid API key", request.uri().path());
            Err(Error::Unauthorized("Invalid API key".into()).into())
        }
        None => Err(Error::Unauthorized("Missing X-API-Key header".into()).into()),
    }
}

/// Compares fixed-length digests without short-circuiting, so the time taken
/// does not depend on where the keys first differ or on their lengths.
fn keys_match(provided: &str, expected: &str) -> bool {
    let a = Sha256::digest(provided.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
