//! Data types for events, matches and rounds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An ingested tournament event. One per canonical source URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    /// Identifier taken from the source URL (e.g. `123` for `/events/123`).
    pub external_id: String,
    pub name: String,
    pub source_url: String,
    /// Unix millis.
    pub ingested_at: i64,
}

/// One map played within a series, owned by its event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: i64,
    pub event_id: String,
    /// Stable source-side match id; unique within an event.
    pub external_id: String,
    pub series_id: String,
    pub team_a: String,
    pub team_b: String,
    pub map_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub created_at: i64,
}

/// Round classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundType {
    Pistol,
    Eco,
    Bonus,
    FullBuy,
    Thrifty,
    Flawless,
    Clutch,
    Ace,
    TeamAce,
    Default,
}

impl RoundType {
    pub const ALL: [RoundType; 10] = [
        Self::Pistol,
        Self::Eco,
        Self::Bonus,
        Self::FullBuy,
        Self::Thrifty,
        Self::Flawless,
        Self::Clutch,
        Self::Ace,
        Self::TeamAce,
        Self::Default,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pistol => "pistol",
            Self::Eco => "eco",
            Self::Bonus => "bonus",
            Self::FullBuy => "full_buy",
            Self::Thrifty => "thrifty",
            Self::Flawless => "flawless",
            Self::Clutch => "clutch",
            Self::Ace => "ace",
            Self::TeamAce => "team_ace",
            Self::Default => "default",
        }
    }

    /// Map a source "ceremony" label onto a round type. Unknown labels are `Default`.
    pub fn from_ceremony(label: &str) -> Self {
        let normalized: String = label
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();
        let normalized = normalized.strip_prefix("ceremony").unwrap_or(&normalized);
        let normalized = normalized.trim_start_matches('_');
        match normalized {
            "pistol" => Self::Pistol,
            "eco" => Self::Eco,
            "bonus" => Self::Bonus,
            "full_buy" | "fullbuy" => Self::FullBuy,
            "thrifty" => Self::Thrifty,
            "flawless" => Self::Flawless,
            "clutch" => Self::Clutch,
            "ace" => Self::Ace,
            "team_ace" | "teamace" => Self::TeamAce,
            _ => Self::Default,
        }
    }
}

impl fmt::Display for RoundType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoundType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown round type '{}'", s))
    }
}

/// One played round; the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub id: i64,
    pub match_id: i64,
    pub external_id: String,
    pub round_num: i32,
    /// Score at the start of the round.
    pub score_a: i32,
    pub score_b: i32,
    pub winning_team: String,
    pub round_type: RoundType,
    pub is_pistol: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub win_condition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vod_url: Option<String>,
    /// Seconds offset into the VOD.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vod_timestamp: Option<i64>,
    pub summary_text: String,
    pub created_at: i64,
}

/// An embedding tagged with the version of the model that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEmbedding {
    pub version: String,
    pub vector: Vec<f32>,
}

/// Match fields supplied on insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMatch {
    pub external_id: String,
    pub series_id: String,
    pub team_a: String,
    pub team_b: String,
    pub map_name: String,
    pub date: Option<String>,
}

/// Round fields supplied on insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRound {
    pub external_id: String,
    pub round_num: i32,
    pub score_a: i32,
    pub score_b: i32,
    pub winning_team: String,
    pub round_type: RoundType,
    pub is_pistol: bool,
    pub win_condition: Option<String>,
    pub vod_url: Option<String>,
    pub vod_timestamp: Option<i64>,
    pub summary_text: String,
    pub embedding: Option<StoredEmbedding>,
}

/// A round with its parent match and event, as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydratedRound {
    pub round: Round,
    pub match_info: Match,
    pub event: Event,
}

/// A round and its parent match, with the stored embedding.
#[derive(Debug, Clone)]
pub struct IndexableRound {
    pub round: Round,
    pub match_info: Match,
    pub embedding: StoredEmbedding,
}

/// Store-level statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub events: i64,
    pub matches: i64,
    pub rounds: i64,
    pub embeddings: i64,
    pub embedding_versions: Vec<String>,
    pub db_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_type_from_ceremony() {
        assert_eq!(RoundType::from_ceremony("Flawless"), RoundType::Flawless);
        assert_eq!(RoundType::from_ceremony("CeremonyThrifty"), RoundType::Thrifty);
        assert_eq!(RoundType::from_ceremony("team ace"), RoundType::TeamAce);
        assert_eq!(RoundType::from_ceremony("none"), RoundType::Default);
        assert_eq!(RoundType::from_ceremony(""), RoundType::Default);
    }

    #[test]
    fn test_round_type_string_forms_agree() {
        for t in RoundType::ALL {
            assert_eq!(t.as_str().parse::<RoundType>().unwrap(), t);
            let json = serde_json::to_value(t).unwrap();
            assert_eq!(json, serde_json::Value::String(t.to_string()));
        }
        assert!("overtime".parse::<RoundType>().is_err());
    }
}
