//! Query request and response types (the `/api/v1/query` wire shape).

use serde::{Deserialize, Serialize};

use crate::intent::Intent;
use retake_index::IndexFilters;
use retake_store::RoundType;

#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub query_text: String,
    #[serde(default = "default_n_results")]
    pub n_results: i64,
    /// Caller scope; intersected with parsed intent, never overridden by it.
    #[serde(default)]
    pub filters: Option<IndexFilters>,
    /// Accepted for client compatibility; just-in-time discovery is not performed.
    #[serde(default)]
    pub jit_index: bool,
}

fn default_n_results() -> i64 {
    5
}

impl QueryRequest {
    pub fn new(query_text: impl Into<String>) -> Self {
        Self {
            query_text: query_text.into(),
            n_results: default_n_results(),
            filters: None,
            jit_index: false,
        }
    }
}

/// Round, match and event fields shown alongside a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub team_a: String,
    pub team_b: String,
    pub score_a: i32,
    pub score_b: i32,
    pub map_name: String,
    pub round_num: i32,
    pub winning_team: String,
    pub round_type: RoundType,
    pub is_pistol: bool,
    pub win_condition: Option<String>,
    pub date: Option<String>,
    pub vod_url: Option<String>,
    pub vod_timestamp: Option<i64>,
    pub event_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Stable round identifier.
    pub id: String,
    pub distance: f64,
    /// `similarity_percent(distance)`.
    pub similarity: i64,
    pub document: String,
    pub event_id: String,
    pub metadata: ResultMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub intent: Intent,
    pub results: Vec<QueryResult>,
}
