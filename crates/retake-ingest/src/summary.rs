//! Natural-language round summaries. These are what gets embedded, so the
//! wording is part of the index contract: change it and run `retake reindex`.

use crate::extract::ExtractedRound;
use retake_store::{Match, NewMatch, Round, RoundType};

/// The fields a summary is rendered from.
#[derive(Debug, Clone, Copy)]
pub struct SummaryFields<'a> {
    pub map_name: &'a str,
    pub team_a: &'a str,
    pub team_b: &'a str,
    pub round_num: i32,
    pub score_a: i32,
    pub score_b: i32,
    pub winning_team: &'a str,
    pub win_condition: Option<&'a str>,
    pub round_type: RoundType,
    pub vod_timestamp: Option<i64>,
}

impl<'a> SummaryFields<'a> {
    pub fn from_extracted(m: &'a NewMatch, r: &'a ExtractedRound) -> Self {
        Self {
            map_name: &m.map_name,
            team_a: &m.team_a,
            team_b: &m.team_b,
            round_num: r.round_num,
            score_a: r.score_a,
            score_b: r.score_b,
            winning_team: &r.winning_team,
            win_condition: r.win_condition.as_deref(),
            round_type: r.round_type,
            vod_timestamp: r.vod_timestamp,
        }
    }

    pub fn from_stored(m: &'a Match, r: &'a Round) -> Self {
        Self {
            map_name: &m.map_name,
            team_a: &m.team_a,
            team_b: &m.team_b,
            round_num: r.round_num,
            score_a: r.score_a,
            score_b: r.score_b,
            winning_team: &r.winning_team,
            win_condition: r.win_condition.as_deref(),
            round_type: r.round_type,
            vod_timestamp: r.vod_timestamp,
        }
    }

    pub fn render(&self) -> String {
        let round_label = if self.round_num == 1 || self.round_num == 13 {
            "Pistol round".to_string()
        } else {
            format!("Round {}", self.round_num)
        };

        let mut text = format!(
            "On the map {} in {} vs {}, the score was {}-{}. {} was won by {} by {}.",
            self.map_name,
            self.team_a,
            self.team_b,
            self.score_a,
            self.score_b,
            round_label,
            self.winning_team,
            self.win_condition.unwrap_or("unknown"),
        );

        if !matches!(self.round_type, RoundType::Default | RoundType::Pistol) {
            text.push_str(&format!(
                " This was a {} round.",
                self.round_type.as_str().replace('_', " ")
            ));
        }

        match self.vod_timestamp {
            Some(ts) => text.push_str(&format!(
                " The VOD for this round starts at approximately {} seconds.",
                ts
            )),
            None => text.push_str(" No VOD timestamp is available for this round."),
        }
        text
    }
}
