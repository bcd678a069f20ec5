//! Ballots and tallies
//!
//! A voter is identified by a salted blake3 hash of their IP address and
//! user agent. The store keeps one row per (matchup, fingerprint).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bracket::{Matchup, MatchupState};
use crate::error::{Result, SaintfestError};

/// Hex-encoded blake3 digest of `salt | ip | user_agent`.
pub fn fingerprint(salt: &str, ip: &str, user_agent: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(salt.as_bytes());
    hasher.update(b"|");
    hasher.update(ip.trim().as_bytes());
    hasher.update(b"|");
    hasher.update(user_agent.trim().as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// Check that a ballot for `saint_id` may be cast on `matchup` at `now`.
pub fn validate_ballot(matchup: &Matchup, saint_id: i64, now: DateTime<Utc>) -> Result<()> {
    match matchup.state_at(now) {
        MatchupState::Open => {}
        MatchupState::AwaitingEntrants => {
            return Err(SaintfestError::Invalid(format!(
                "matchup {} has no opponents yet",
                matchup.id
            )))
        }
        _ => return Err(SaintfestError::VotingClosed(matchup.id)),
    }

    if !matchup.involves(saint_id) {
        return Err(SaintfestError::Invalid(format!(
            "saint {} is not competing in matchup {}",
            saint_id, matchup.id
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoteTally {
    pub matchup_id: i64,
    pub saint_a: Option<i64>,
    pub votes_a: u64,
    pub saint_b: Option<i64>,
    pub votes_b: u64,
}

impl VoteTally {
    pub fn empty(matchup: &Matchup) -> Self {
        Self {
            matchup_id: matchup.id,
            saint_a: matchup.saint_a,
            votes_a: 0,
            saint_b: matchup.saint_b,
            votes_b: 0,
        }
    }

    pub fn total(&self) -> u64 {
        self.votes_a + self.votes_b
    }

    /// Vote shares in percent; both 0 before any vote.
    pub fn percentages(&self) -> (f64, f64) {
        let total = self.total();
        if total == 0 {
            return (0.0, 0.0);
        }
        let a = self.votes_a as f64 * 100.0 / total as f64;
        (a, 100.0 - a)
    }

    /// Saint with more votes; `None` on a tie.
    pub fn leader(&self) -> Option<i64> {
        match self.votes_a.cmp(&self.votes_b) {
            std::cmp::Ordering::Greater => self.saint_a,
            std::cmp::Ordering::Less => self.saint_b,
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn votes_for(&self, saint_id: i64) -> u64 {
        if self.saint_a == Some(saint_id) {
            self.votes_a
        } else if self.saint_b == Some(saint_id) {
            self.votes_b
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::Duration;

    fn open_matchup(now: DateTime<Utc>) -> Matchup {
        let mut m = Matchup::empty(0, 0, None);
        m.id = 9;
        m.saint_a = Some(1);
        m.saint_b = Some(2);
        m.opens_at = Some(now - Duration::hours(1));
        m.closes_at = Some(now + Duration::hours(1));
        m
    }

    #[test]
    fn test_fingerprint_is_stable_and_salted() {
        let a = fingerprint("salt", "203.0.113.7", "Mozilla/5.0");
        let b = fingerprint("salt", "203.0.113.7", "Mozilla/5.0");
        let c = fingerprint("other", "203.0.113.7", "Mozilla/5.0");
        let d = fingerprint("salt", "203.0.113.8", "Mozilla/5.0");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fingerprint_separates_fields() {
        // "1.2.3.4|5" + "x" must not collide with "1.2.3.4" + "5|x"
        assert_ne!(fingerprint("", "1.2.3.45", "x"), fingerprint("", "1.2.3.4", "5x"));
    }

    #[test]
    fn test_validate_ballot() {
        let now = Utc::now();
        let m = open_matchup(now);
        assert!(validate_ballot(&m, 1, now).is_ok());
        assert!(matches!(validate_ballot(&m, 3, now), Err(SaintfestError::Invalid(_))));
        assert!(matches!(
            validate_ballot(&m, 1, now + Duration::hours(2)),
            Err(SaintfestError::VotingClosed(9))
        ));
        assert!(matches!(
            validate_ballot(&m, 1, now - Duration::hours(2)),
            Err(SaintfestError::VotingClosed(9))
        ));
    }

    #[test]
    fn test_validate_ballot_decided_matchup_is_closed() {
        let now = Utc::now();
        let mut m = open_matchup(now);
        m.winner = Some(1);
        assert!(matches!(validate_ballot(&m, 2, now), Err(SaintfestError::VotingClosed(_))));
    }

    #[test]
    fn test_tally_percentages_and_leader() {
        let now = Utc::now();
        let mut tally = VoteTally::empty(&open_matchup(now));
        assert_eq!(tally.percentages(), (0.0, 0.0));
        assert_eq!(tally.leader(), None);

        tally.votes_a = 3;
        tally.votes_b = 1;
        let (a, b) = tally.percentages();
        assert_relative_eq!(a, 75.0, epsilon = 1e-9);
        assert_relative_eq!(b, 25.0, epsilon = 1e-9);
        assert_eq!(tally.leader(), Some(1));
        assert_eq!(tally.votes_for(2), 1);
        assert_eq!(tally.votes_for(42), 0);

        tally.votes_b = 3;
        assert_eq!(tally.leader(), None);
    }
}
