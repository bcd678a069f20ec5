//! Matchup states, winner propagation and the tournament summary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Bracket, Matchup};
use crate::error::{Result, SaintfestError};
use crate::voting::VoteTally;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchupState {
    /// One or both slots still wait on an earlier round.
    AwaitingEntrants,
    Unscheduled,
    Upcoming,
    Open,
    /// The voting session ended but no winner was recorded yet.
    AwaitingResult,
    Decided,
}

impl Matchup {
    pub fn state_at(&self, now: DateTime<Utc>) -> MatchupState {
        if self.winner.is_some() {
            return MatchupState::Decided;
        }
        if self.entrants().is_none() {
            return MatchupState::AwaitingEntrants;
        }
        match (self.opens_at, self.closes_at) {
            (Some(opens), Some(closes)) => {
                if now < opens {
                    MatchupState::Upcoming
                } else if now < closes {
                    MatchupState::Open
                } else {
                    MatchupState::AwaitingResult
                }
            }
            _ => MatchupState::Unscheduled,
        }
    }
}

/// Winner of a matchup from its tally, or the administrator's override.
pub fn decide_winner(matchup: &Matchup, tally: &VoteTally, override_winner: Option<i64>) -> Result<i64> {
    if matchup.entrants().is_none() {
        return Err(SaintfestError::Invalid(format!(
            "matchup {} has no opponents yet",
            matchup.id
        )));
    }

    if let Some(winner) = override_winner {
        if !matchup.involves(winner) {
            return Err(SaintfestError::Invalid(format!(
                "saint {} is not competing in matchup {}",
                winner, matchup.id
            )));
        }
        return Ok(winner);
    }

    tally.leader().ok_or(SaintfestError::Tie(matchup.id))
}

/// Summary of where the tournament stands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketProgress {
    pub year: i32,
    /// First round that still has undecided matchups.
    pub current_round: Option<usize>,
    pub current_round_name: Option<String>,
    pub decided: usize,
    pub total: usize,
    /// Entrants not yet eliminated.
    pub remaining: Vec<i64>,
    /// The four semifinalists, as far as they are known.
    pub consecrated_quaternary: Vec<i64>,
    pub blessed_intercessor: Option<i64>,
}

impl Bracket {
    /// Record `winner` for a matchup and carry them into the next round.
    ///
    /// Returns the (round, position) of every matchup that changed.
    pub fn record_winner(&mut self, round: usize, position: usize, winner: i64) -> Result<Vec<(usize, usize)>> {
        let matchup = self
            .matchup(round, position)
            .ok_or_else(|| SaintfestError::not_found("matchup", format!("{}/{}", round, position)))?;

        if matchup.entrants().is_none() {
            return Err(SaintfestError::Invalid(format!(
                "matchup {} has no opponents yet",
                matchup.id
            )));
        }
        if !matchup.involves(winner) {
            return Err(SaintfestError::Invalid(format!(
                "saint {} is not competing in matchup {}",
                winner, matchup.id
            )));
        }
        if matchup.winner == Some(winner) {
            return Ok(Vec::new());
        }

        let mut changed = vec![(round, position)];

        if round + 1 < self.rounds.len() {
            let next_position = position / 2;
            let next = self
                .matchup_mut(round + 1, next_position)
                .ok_or_else(|| SaintfestError::not_found("matchup", format!("{}/{}", round + 1, next_position)))?;
            if next.winner.is_some() {
                return Err(SaintfestError::Conflict(format!(
                    "matchup {} in the next round is already decided",
                    next.id
                )));
            }
            if position % 2 == 0 {
                next.saint_a = Some(winner);
            } else {
                next.saint_b = Some(winner);
            }
            changed.push((round + 1, next_position));
        }

        if let Some(matchup) = self.matchup_mut(round, position) {
            matchup.winner = Some(winner);
        }
        Ok(changed)
    }

    pub fn progress(&self) -> BracketProgress {
        let total = self.matchups().count();
        let decided = self.matchups().filter(|m| m.winner.is_some()).count();

        let current_round = self
            .rounds
            .iter()
            .find(|r| r.matchups.iter().any(|m| m.winner.is_none()))
            .map(|r| r.index);

        let eliminated: Vec<i64> = self.matchups().filter_map(Matchup::loser).collect();
        let remaining = self
            .entrants()
            .into_iter()
            .filter(|id| !eliminated.contains(id))
            .collect();

        let consecrated_quaternary = if self.rounds.len() >= 2 {
            self.rounds[self.rounds.len() - 2]
                .matchups
                .iter()
                .flat_map(|m| [m.saint_a, m.saint_b])
                .flatten()
                .collect()
        } else {
            Vec::new()
        };

        BracketProgress {
            year: self.year,
            current_round,
            current_round_name: current_round.map(|r| self.rounds[r].name.clone()),
            decided,
            total,
            remaining,
            consecrated_quaternary,
            blessed_intercessor: self.final_matchup().and_then(|m| m.winner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    /// 8-saint bracket with saints 1..=8 drawn in order.
    fn bracket_of_eight() -> Bracket {
        let mut bracket = Bracket::empty(2026, "Test", 8, vec![]).unwrap();
        for (position, matchup) in bracket.rounds[0].matchups.iter_mut().enumerate() {
            matchup.saint_a = Some(position as i64 * 2 + 1);
            matchup.saint_b = Some(position as i64 * 2 + 2);
        }
        let mut id = 0;
        for round in bracket.rounds.iter_mut() {
            for m in round.matchups.iter_mut() {
                id += 1;
                m.id = id;
            }
        }
        bracket
    }

    #[test]
    fn test_state_at() {
        let now = Utc::now();
        let mut m = Matchup::empty(0, 0, None);
        assert_eq!(m.state_at(now), MatchupState::AwaitingEntrants);

        m.saint_a = Some(1);
        m.saint_b = Some(2);
        assert_eq!(m.state_at(now), MatchupState::Unscheduled);

        m.opens_at = Some(now + Duration::hours(1));
        m.closes_at = Some(now + Duration::hours(25));
        assert_eq!(m.state_at(now), MatchupState::Upcoming);
        assert_eq!(m.state_at(now + Duration::hours(1)), MatchupState::Open);
        assert_eq!(m.state_at(now + Duration::hours(25)), MatchupState::AwaitingResult);

        m.winner = Some(2);
        assert_eq!(m.state_at(now), MatchupState::Decided);
    }

    #[test]
    fn test_decide_winner() {
        let bracket = bracket_of_eight();
        let m = bracket.matchup(0, 0).unwrap();
        let mut tally = VoteTally::empty(m);

        assert!(matches!(decide_winner(m, &tally, None), Err(SaintfestError::Tie(1))));
        assert_eq!(decide_winner(m, &tally, Some(2)).unwrap(), 2);
        assert!(decide_winner(m, &tally, Some(7)).is_err());

        tally.votes_b = 10;
        tally.votes_a = 4;
        assert_eq!(decide_winner(m, &tally, None).unwrap(), 2);
        // the override wins over the tally
        assert_eq!(decide_winner(m, &tally, Some(1)).unwrap(), 1);

        let pending = bracket.matchup(1, 0).unwrap();
        assert!(decide_winner(pending, &VoteTally::empty(pending), Some(1)).is_err());
    }

    #[test]
    fn test_record_winner_propagates() {
        let mut bracket = bracket_of_eight();

        let changed = bracket.record_winner(0, 0, 2).unwrap();
        assert_eq!(changed, vec![(0, 0), (1, 0)]);
        assert_eq!(bracket.matchup(1, 0).unwrap().saint_a, Some(2));

        bracket.record_winner(0, 1, 3).unwrap();
        assert_eq!(bracket.matchup(1, 0).unwrap().saint_b, Some(3));

        bracket.record_winner(0, 3, 8).unwrap();
        assert_eq!(bracket.matchup(1, 1).unwrap().saint_b, Some(8));
        assert_eq!(bracket.matchup(1, 1).unwrap().saint_a, None);

        // same winner again changes nothing
        assert!(bracket.record_winner(0, 0, 2).unwrap().is_empty());
    }

    #[test]
    fn test_record_winner_rejects_outsiders_and_empty_slots() {
        let mut bracket = bracket_of_eight();
        assert!(matches!(bracket.record_winner(0, 0, 5), Err(SaintfestError::Invalid(_))));
        assert!(matches!(bracket.record_winner(1, 0, 1), Err(SaintfestError::Invalid(_))));
        assert!(matches!(bracket.record_winner(9, 0, 1), Err(SaintfestError::NotFound(_))));
    }

    #[test]
    fn test_record_winner_correction_before_next_round_decides() {
        let mut bracket = bracket_of_eight();
        bracket.record_winner(0, 0, 1).unwrap();
        bracket.record_winner(0, 0, 2).unwrap();
        assert_eq!(bracket.matchup(1, 0).unwrap().saint_a, Some(2));

        bracket.record_winner(0, 1, 3).unwrap();
        bracket.record_winner(1, 0, 3).unwrap();
        assert!(matches!(bracket.record_winner(0, 0, 1), Err(SaintfestError::Conflict(_))));
    }

    #[test]
    fn test_progress_through_final() {
        let mut bracket = bracket_of_eight();
        let start = bracket.progress();
        assert_eq!(start.current_round, Some(0));
        assert_eq!(start.total, 7);
        assert_eq!(start.remaining.len(), 8);
        assert!(start.consecrated_quaternary.is_empty());

        for (position, winner) in [(0, 1), (1, 3), (2, 5), (3, 7)] {
            bracket.record_winner(0, position, winner).unwrap();
        }
        let mid = bracket.progress();
        assert_eq!(mid.current_round, Some(1));
        assert_eq!(mid.current_round_name.as_deref(), Some("Consecrated Quaternary"));
        assert_eq!(mid.remaining, vec![1, 3, 5, 7]);
        assert_eq!(mid.consecrated_quaternary, vec![1, 3, 5, 7]);

        bracket.record_winner(1, 0, 3).unwrap();
        bracket.record_winner(1, 1, 5).unwrap();
        bracket.record_winner(2, 0, 5).unwrap();

        let done = bracket.progress();
        assert_eq!(done.current_round, None);
        assert_eq!(done.decided, 7);
        assert_eq!(done.remaining, vec![5]);
        assert_eq!(done.blessed_intercessor, Some(5));
    }
}
