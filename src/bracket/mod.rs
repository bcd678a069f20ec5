//! Single-elimination brackets
//!
//! A bracket of `size` entrants has `log2(size)` rounds. Round `r` holds
//! `size / 2^(r+1)` matchups; the winner of matchup `p` in round `r` fills
//! slot `p % 2` of matchup `p / 2` in round `r + 1`.
//!
//! - `generator`: random draw of entrants into first-round pairs
//! - `progress`: matchup states, winners, tournament summary
//! - `schedule`: daily voting sessions
//! - `layout`: box and connector geometry for drawing
//! - `svg`: printable export

pub mod generator;
pub mod layout;
pub mod progress;
pub mod schedule;
pub mod svg;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SaintfestError};

pub use generator::{generate_bracket_structure, round_name, rounds_for_size, BracketPlan, DEFAULT_BRACKET_SIZE};
pub use layout::{compute_layout, BracketLayout, ConnectorLine, LayoutOptions, MatchupBox};
pub use progress::{decide_winner, BracketProgress, MatchupState};
pub use schedule::{schedule_round, schedule_tournament};
pub use svg::render_svg;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bracket {
    /// 0 until persisted
    pub id: i64,
    pub year: i32,
    pub title: String,
    pub size: usize,
    /// Region titles in draw order; empty for an open draw.
    pub regions: Vec<String>,
    pub rounds: Vec<Round>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub index: usize,
    pub name: String,
    pub matchups: Vec<Matchup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matchup {
    /// 0 until persisted
    pub id: i64,
    pub round: usize,
    pub position: usize,
    pub region: Option<String>,
    pub saint_a: Option<i64>,
    pub saint_b: Option<i64>,
    pub winner: Option<i64>,
    pub opens_at: Option<DateTime<Utc>>,
    pub closes_at: Option<DateTime<Utc>>,
}

impl Matchup {
    pub fn empty(round: usize, position: usize, region: Option<String>) -> Self {
        Self {
            id: 0,
            round,
            position,
            region,
            saint_a: None,
            saint_b: None,
            winner: None,
            opens_at: None,
            closes_at: None,
        }
    }

    /// Both entrants, once known.
    pub fn entrants(&self) -> Option<(i64, i64)> {
        Some((self.saint_a?, self.saint_b?))
    }

    pub fn involves(&self, saint_id: i64) -> bool {
        self.saint_a == Some(saint_id) || self.saint_b == Some(saint_id)
    }

    /// The entrant that did not win.
    pub fn loser(&self) -> Option<i64> {
        let winner = self.winner?;
        let (a, b) = self.entrants()?;
        Some(if winner == a { b } else { a })
    }
}

impl Bracket {
    /// Skeleton with every slot empty.
    pub fn empty(year: i32, title: &str, size: usize, regions: Vec<String>) -> Result<Self> {
        let total_rounds = rounds_for_size(size)?;

        if !regions.is_empty() && (size % regions.len() != 0 || size / regions.len() < 2) {
            return Err(SaintfestError::Invalid(format!(
                "{} regions cannot split a bracket of {}",
                regions.len(),
                size
            )));
        }
        // first-round matchups per region
        let region_width = if regions.is_empty() { 0 } else { size / regions.len() / 2 };

        let rounds = (0..total_rounds)
            .map(|index| {
                let count = size >> (index + 1);
                let per_region = region_width >> index;
                let matchups = (0..count)
                    .map(|position| {
                        let region = if per_region >= 1 {
                            regions.get(position / per_region).cloned()
                        } else {
                            None
                        };
                        Matchup::empty(index, position, region)
                    })
                    .collect();
                Round {
                    index,
                    name: round_name(index, total_rounds),
                    matchups,
                }
            })
            .collect();

        Ok(Self {
            id: 0,
            year,
            title: title.to_string(),
            size,
            regions,
            rounds,
            created_at: Utc::now(),
        })
    }

    pub fn round_count(&self) -> usize {
        self.rounds.len()
    }

    pub fn matchup(&self, round: usize, position: usize) -> Option<&Matchup> {
        self.rounds.get(round)?.matchups.get(position)
    }

    pub fn matchup_mut(&mut self, round: usize, position: usize) -> Option<&mut Matchup> {
        self.rounds.get_mut(round)?.matchups.get_mut(position)
    }

    pub fn find_matchup(&self, matchup_id: i64) -> Option<&Matchup> {
        self.matchups().find(|m| m.id == matchup_id)
    }

    pub fn matchups(&self) -> impl Iterator<Item = &Matchup> {
        self.rounds.iter().flat_map(|r| r.matchups.iter())
    }

    pub fn final_matchup(&self) -> Option<&Matchup> {
        self.rounds.last()?.matchups.first()
    }

    /// Saint ids of the first-round draw, in slot order.
    pub fn entrants(&self) -> Vec<i64> {
        self.rounds
            .first()
            .map(|r| {
                r.matchups
                    .iter()
                    .flat_map(|m| [m.saint_a, m.saint_b])
                    .flatten()
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Listing row for brackets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketSummary {
    pub id: i64,
    pub year: i32,
    pub title: String,
    pub size: usize,
    pub created_at: DateTime<Utc>,
}

impl From<&Bracket> for BracketSummary {
    fn from(b: &Bracket) -> Self {
        Self {
            id: b.id,
            year: b.year,
            title: b.title.clone(),
            size: b.size,
            created_at: b.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_skeleton_shape() {
        let bracket = Bracket::empty(2026, "Saintfest 2026", 32, vec![]).unwrap();
        assert_eq!(bracket.round_count(), 5);
        let counts: Vec<usize> = bracket.rounds.iter().map(|r| r.matchups.len()).collect();
        assert_eq!(counts, vec![16, 8, 4, 2, 1]);
        assert!(bracket.matchups().all(|m| m.saint_a.is_none() && m.region.is_none()));
        assert_eq!(bracket.final_matchup().map(|m| m.round), Some(4));
    }

    #[test]
    fn test_regions_follow_matchups_until_they_merge() {
        let regions: Vec<String> = ["Martyrs", "Mystics", "Bishops", "Virgins"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let bracket = Bracket::empty(2026, "Saintfest", 32, regions).unwrap();

        // 8 saints per region: 4, 2, 1 matchups per region in rounds 0..3
        assert_eq!(bracket.matchup(0, 3).unwrap().region.as_deref(), Some("Martyrs"));
        assert_eq!(bracket.matchup(0, 4).unwrap().region.as_deref(), Some("Mystics"));
        assert_eq!(bracket.matchup(1, 7).unwrap().region.as_deref(), Some("Virgins"));
        assert_eq!(bracket.matchup(2, 2).unwrap().region.as_deref(), Some("Bishops"));
        assert_eq!(bracket.matchup(3, 0).unwrap().region, None);
        assert_eq!(bracket.matchup(4, 0).unwrap().region, None);
    }

    #[test]
    fn test_empty_rejects_uneven_regions() {
        let regions = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert!(Bracket::empty(2026, "x", 32, regions).is_err());
    }

    #[test]
    fn test_loser() {
        let mut m = Matchup::empty(0, 0, None);
        m.saint_a = Some(1);
        m.saint_b = Some(2);
        assert_eq!(m.loser(), None);
        m.winner = Some(2);
        assert_eq!(m.loser(), Some(1));
    }
}
