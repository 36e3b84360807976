//! Keyword intent parsing.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use retake_index::IndexFilters;
use retake_store::RoundType;

/// Structured hints pulled from a free-text query. Absent fields are `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    /// Team slug, e.g. `paperrex`.
    pub team: Option<String>,
    /// Capitalised map name, e.g. `Haven`.
    pub map: Option<String>,
    pub round_type: Option<RoundType>,
}

impl Intent {
    pub fn is_empty(&self) -> bool {
        self.team.is_none() && self.map.is_none() && self.round_type.is_none()
    }

    pub fn to_filters(&self) -> IndexFilters {
        IndexFilters {
            team: self.team.clone(),
            map: self.map.clone(),
            round_type: self.round_type,
            ..Default::default()
        }
    }
}

const TEAM_ALIASES: &[(&str, &str)] = &[
    ("prx", "paperrex"),
    ("paper rex", "paperrex"),
    ("drx", "drx"),
    ("fnc", "fnatic"),
    ("fnatic", "fnatic"),
    ("nrg", "nrg"),
    ("sen", "sentinels"),
    ("sentinels", "sentinels"),
    ("th", "teamheretics"),
    ("heretics", "teamheretics"),
    ("team heretics", "teamheretics"),
    ("lev", "leviatán"),
    ("leviatan", "leviatán"),
    ("leviatán", "leviatán"),
    ("loud", "loud"),
    ("tl", "teamliquid"),
    ("liquid", "teamliquid"),
    ("team liquid", "teamliquid"),
];

const MAPS: &[&str] = &[
    "Ascent", "Bind", "Haven", "Lotus", "Sunset", "Abyss", "Split", "Fracture", "Icebox",
    "Breeze", "Pearl", "Corrode",
];

const ROUND_TYPES: &[(&str, RoundType)] = &[
    (r"team\s*aces?", RoundType::TeamAce),
    (r"aces?", RoundType::Ace),
    (r"pistols?", RoundType::Pistol),
    (r"ecos?|saves?|save rounds?", RoundType::Eco),
    (r"bonus(?:es)?", RoundType::Bonus),
    (r"full[\s-]?buys?", RoundType::FullBuy),
    (r"thrifty|thrifties", RoundType::Thrifty),
    (r"flawless", RoundType::Flawless),
    (r"clutch(?:es)?", RoundType::Clutch),
];

fn word(pattern: &str) -> Regex {
    Regex::new(&format!(r"(?i)\b(?:{})\b", pattern)).unwrap()
}

static TEAM_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    TEAM_ALIASES
        .iter()
        .map(|(alias, slug)| (word(&regex::escape(alias).replace(' ', r"\s+")), *slug))
        .collect()
});

static MAP_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    MAPS.iter().map(|m| (word(&regex::escape(m)), *m)).collect()
});

static ROUND_TYPE_PATTERNS: Lazy<Vec<(Regex, RoundType)>> = Lazy::new(|| {
    ROUND_TYPES.iter().map(|(p, t)| (word(p), *t)).collect()
});

/// The value whose pattern matches earliest in `text`; list order breaks ties.
fn earliest<T: Copy>(patterns: &[(Regex, T)], text: &str) -> Option<T> {
    patterns
        .iter()
        .enumerate()
        .filter_map(|(rank, (re, value))| re.find(text).map(|m| (m.start(), rank, *value)))
        .min_by_key(|(start, rank, _)| (*start, *rank))
        .map(|(_, _, value)| value)
}

/// Extract team, map and round type from a query. Never fails.
pub fn parse_intent(query: &str) -> Intent {
    Intent {
        team: earliest(&TEAM_PATTERNS, query).map(str::to_string),
        map: earliest(&MAP_PATTERNS, query).map(str::to_string),
        round_type: earliest(&ROUND_TYPE_PATTERNS, query),
    }
}
