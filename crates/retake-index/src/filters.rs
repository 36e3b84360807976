//! Per-entry metadata and the filters evaluated against it.

use serde::{Deserialize, Serialize};

use retake_store::{Match, Round, RoundType};

/// Normalise a team name into the slug used for filtering
/// ("Team Heretics" → "teamheretics", "FNATIC Esports" → "fnatic").
pub fn team_slug(name: &str) -> String {
    name.to_lowercase()
        .replace("esports", "")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .collect()
}

/// Metadata copied from a round and its match when the round is indexed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub event_id: String,
    pub match_id: i64,
    /// Lowercase map name.
    pub map_name: String,
    /// Slugs of team A, team B and the winner.
    pub team_slugs: Vec<String>,
    pub round_type: RoundType,
    pub is_pistol: bool,
}

impl EntryMetadata {
    pub fn from_round(match_info: &Match, round: &Round) -> Self {
        let mut team_slugs: Vec<String> = Vec::with_capacity(3);
        for name in [&match_info.team_a, &match_info.team_b, &round.winning_team] {
            let slug = team_slug(name);
            if !team_slugs.contains(&slug) {
                team_slugs.push(slug);
            }
        }
        Self {
            event_id: match_info.event_id.clone(),
            match_id: match_info.id,
            map_name: match_info.map_name.to_lowercase(),
            team_slugs,
            round_type: round.round_type,
            is_pistol: round.is_pistol,
        }
    }
}

/// Candidate restrictions applied before ranking. All set fields must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_id: Option<i64>,
    /// Team name or slug; matches team A, team B or the winner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_type: Option<RoundType>,
}

impl IndexFilters {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn matches(&self, meta: &EntryMetadata) -> bool {
        if let Some(event_id) = &self.event_id {
            if &meta.event_id != event_id {
                return false;
            }
        }
        if let Some(match_id) = self.match_id {
            if meta.match_id != match_id {
                return false;
            }
        }
        if let Some(team) = &self.team {
            let slug = team_slug(team);
            if !meta.team_slugs.iter().any(|s| *s == slug) {
                return false;
            }
        }
        if let Some(map) = &self.map {
            if !meta.map_name.eq_ignore_ascii_case(map.trim()) {
                return false;
            }
        }
        match self.round_type {
            Some(RoundType::Pistol) => meta.is_pistol || meta.round_type == RoundType::Pistol,
            Some(t) => meta.round_type == t,
            None => true,
        }
    }
}
