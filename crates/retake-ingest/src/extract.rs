//! Series payload → matches and rounds.
//!
//! A series page carries both teams, every map played (a "match" here), each
//! map's rounds, and a kill feed used to locate round starts in the VOD.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use url::Url;

use crate::discovery::id_string;
use retake_core::{Error, Result};
use retake_store::{NewMatch, RoundType};

const VOD_TIME_PARAMS: [&str; 2] = ["t", "start"];

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SeriesPayload {
    start_date: Option<String>,
    team1: Option<TeamPayload>,
    team2: Option<TeamPayload>,
    stats: Option<StatsPayload>,
    matches: Option<Vec<MatchPayload>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TeamPayload {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StatsPayload {
    kills: Option<Vec<KillPayload>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct KillPayload {
    round_id: Option<Value>,
    game_time_millis: Option<f64>,
    round_time_millis: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct MatchPayload {
    id: Option<Value>,
    completed: Option<bool>,
    map: Option<MapPayload>,
    vod_url: Option<String>,
    rounds: Option<Vec<RoundPayload>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MapPayload {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RoundPayload {
    id: Option<Value>,
    number: Option<i64>,
    winning_team_number: Option<i64>,
    win_condition: Option<String>,
    ceremony: Option<String>,
}

/// One round as read from the source, before summary and embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedRound {
    pub external_id: String,
    pub round_num: i32,
    /// Score before this round was played.
    pub score_a: i32,
    pub score_b: i32,
    pub winning_team: String,
    pub round_type: RoundType,
    pub is_pistol: bool,
    pub win_condition: Option<String>,
    pub vod_url: Option<String>,
    pub vod_timestamp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedMatch {
    pub new_match: NewMatch,
    pub rounds: Vec<ExtractedRound>,
}

/// Extract every completed map of a series from its page payload.
///
/// Accepts the whole `__NEXT_DATA__` document or the bare series object.
pub fn extract_series(series_id: &str, data: &Value) -> Result<Vec<ExtractedMatch>> {
    let raw = match data.pointer("/props/pageProps/series") {
        Some(series) if !series.is_null() => series,
        _ if data.get("matches").is_some() => data,
        _ => {
            return Err(Error::Extraction(format!(
                "series {} page has no series payload",
                series_id
            )))
        }
    };
    let series: SeriesPayload = serde_json::from_value(raw.clone())
        .map_err(|e| Error::Extraction(format!("series {}: {}", series_id, e)))?;

    let team_a = team_name(&series.team1, "Team 1");
    let team_b = team_name(&series.team2, "Team 2");

    // First kill of each round: game time minus time into the round.
    let mut round_starts: HashMap<String, f64> = HashMap::new();
    for kill in series
        .stats
        .as_ref()
        .and_then(|s| s.kills.as_ref())
        .into_iter()
        .flatten()
    {
        let Some(round_id) = kill.round_id.as_ref().and_then(id_string) else {
            continue;
        };
        round_starts.entry(round_id).or_insert_with(|| {
            kill.game_time_millis.unwrap_or(0.0) - kill.round_time_millis.unwrap_or(0.0)
        });
    }

    let mut out = Vec::new();
    for map_match in series.matches.unwrap_or_default() {
        if map_match.completed != Some(true) {
            continue;
        }
        let Some(match_id) = map_match.id.as_ref().and_then(id_string) else {
            warn!("Series {}: completed map without an id, skipping", series_id);
            continue;
        };
        let map_name = map_match
            .map
            .and_then(|m| m.name)
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| "Unknown Map".to_string());

        let vod_start = map_match.vod_url.as_deref().map(vod_start_seconds).unwrap_or(0);
        let vod_base = map_match.vod_url.as_deref().map(strip_vod_time);

        let mut rounds = map_match.rounds.unwrap_or_default();
        rounds.sort_by_key(|r| r.number.unwrap_or(0));
        let first_start = rounds
            .first()
            .and_then(|r| r.id.as_ref())
            .and_then(id_string)
            .and_then(|id| round_starts.get(&id).copied());

        let mut score_a = 0;
        let mut score_b = 0;
        let mut extracted = Vec::with_capacity(rounds.len());
        for round in rounds {
            let (Some(number), Some(round_id)) = (round.number, round.id.as_ref().and_then(id_string))
            else {
                continue;
            };
            let winner_num = round.winning_team_number.unwrap_or(0);
            if number <= 0 || !(winner_num == 1 || winner_num == 2) {
                continue;
            }
            let round_num = number as i32;

            let vod_timestamp = match (first_start, round_starts.get(&round_id)) {
                (Some(first), Some(start)) => {
                    Some((vod_start as f64 + (start - first) / 1000.0).trunc() as i64)
                }
                _ => None,
            };
            let vod_url = match (&vod_base, vod_timestamp) {
                (Some(base), Some(ts)) => Some(with_vod_time(base, ts)),
                _ => None,
            };

            let is_pistol = round_num == 1 || round_num == 13;
            let mut round_type = round
                .ceremony
                .as_deref()
                .map(RoundType::from_ceremony)
                .unwrap_or(RoundType::Default);
            if round_type == RoundType::Default && is_pistol {
                round_type = RoundType::Pistol;
            }

            let winning_team = if winner_num == 1 { &team_a } else { &team_b };
            extracted.push(ExtractedRound {
                external_id: round_external_id(&match_id, round_num),
                round_num,
                score_a,
                score_b,
                winning_team: winning_team.clone(),
                round_type,
                is_pistol,
                win_condition: round.win_condition.filter(|c| !c.trim().is_empty()),
                vod_url,
                vod_timestamp,
            });

            if winner_num == 1 {
                score_a += 1;
            } else {
                score_b += 1;
            }
        }

        if extracted.is_empty() {
            debug!("Series {} map {} has no usable rounds", series_id, match_id);
            continue;
        }
        out.push(ExtractedMatch {
            new_match: NewMatch {
                external_id: match_id,
                series_id: series_id.to_string(),
                team_a: team_a.clone(),
                team_b: team_b.clone(),
                map_name,
                date: series.start_date.clone(),
            },
            rounds: extracted,
        });
    }

    debug!("Series {}: extracted {} completed maps", series_id, out.len());
    Ok(out)
}

fn team_name(team: &Option<TeamPayload>, fallback: &str) -> String {
    team.as_ref()
        .and_then(|t| t.name.as_deref())
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

/// Stable id for a round: hex SHA-256 of the source match id and round number.
pub fn round_external_id(match_external_id: &str, round_num: i32) -> String {
    let digest = Sha256::digest(format!("{}:{}", match_external_id, round_num).as_bytes());
    hex::encode(digest)
}

/// Start offset in seconds from a VOD URL's `t`/`start` parameter
/// (`600`, `600s`, `1h2m3s`). Anything unparseable is 0.
pub fn vod_start_seconds(vod_url: &str) -> i64 {
    let Ok(url) = Url::parse(vod_url) else {
        return 0;
    };
    url.query_pairs()
        .find(|(k, _)| is_time_param(k))
        .and_then(|(_, v)| parse_duration(&v))
        .unwrap_or(0)
}

fn is_time_param(key: &str) -> bool {
    VOD_TIME_PARAMS.contains(&key)
}

fn parse_duration(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<i64>() {
        return Some(secs);
    }
    let mut total = 0i64;
    let mut digits = String::new();
    for c in raw.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let n: i64 = digits.parse().ok()?;
        digits.clear();
        total += match c {
            'h' => n * 3600,
            'm' => n * 60,
            's' => n,
            _ => return None,
        };
    }
    if !digits.is_empty() {
        total += digits.parse::<i64>().ok()?;
    }
    Some(total)
}

/// Drop any existing time parameter from a VOD URL.
pub fn strip_vod_time(vod_url: &str) -> String {
    let Ok(mut url) = Url::parse(vod_url) else {
        let mut base = vod_url.to_string();
        for marker in ["?t=", "&t=", "?start=", "&start="] {
            if let Some(pos) = base.find(marker) {
                base.truncate(pos);
            }
        }
        return base;
    };
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_time_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url.to_string()
}

fn with_vod_time(base: &str, seconds: i64) -> String {
    let sep = if base.contains('?') { '&' } else { '?' };
    format!("{}{}t={}s", base, sep, seconds)
}
