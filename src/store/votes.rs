//! Ballots

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::Store;
use crate::bracket::Matchup;
use crate::error::{Result, SaintfestError};
use crate::voting::{validate_ballot, VoteTally};

impl Store {
    /// Check the matchup is open and record one ballot per fingerprint.
    ///
    /// The check and the insert run under the same lock, so two requests from
    /// one device cannot both pass.
    pub fn cast_vote(
        &self,
        matchup_id: i64,
        saint_id: i64,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<VoteTally> {
        let conn = self.lock();
        let matchup = conn
            .query_row(
                "SELECT id, round, position, region, saint_a, saint_b, winner, opens_at, closes_at
                 FROM matchups WHERE id = ?1",
                [matchup_id],
                |row| {
                    let round: i64 = row.get(1)?;
                    let position: i64 = row.get(2)?;
                    Ok(Matchup {
                        id: row.get(0)?,
                        round: round as usize,
                        position: position as usize,
                        region: row.get(3)?,
                        saint_a: row.get(4)?,
                        saint_b: row.get(5)?,
                        winner: row.get(6)?,
                        opens_at: row.get(7)?,
                        closes_at: row.get(8)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| SaintfestError::not_found("matchup", matchup_id))?;

        validate_ballot(&matchup, saint_id, now)?;

        conn.execute(
            "INSERT INTO votes (matchup_id, saint_id, fingerprint, cast_at) VALUES (?1, ?2, ?3, ?4)",
            params![matchup_id, saint_id, fingerprint, now],
        )
        .map_err(|e| {
            let err = SaintfestError::from(e);
            if err.is_constraint_violation() {
                SaintfestError::AlreadyVoted(matchup_id)
            } else {
                err
            }
        })?;

        tracing::debug!("Vote recorded for saint {} in matchup {}", saint_id, matchup_id);
        tally_with(&conn, &matchup)
    }

    pub fn tally(&self, matchup: &Matchup) -> Result<VoteTally> {
        let conn = self.lock();
        tally_with(&conn, matchup)
    }

    pub fn has_voted(&self, matchup_id: i64, fingerprint: &str) -> Result<bool> {
        let conn = self.lock();
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM votes WHERE matchup_id = ?1 AND fingerprint = ?2",
                params![matchup_id, fingerprint],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

pub(super) fn tally_with(conn: &rusqlite::Connection, matchup: &Matchup) -> Result<VoteTally> {
    let mut tally = VoteTally::empty(matchup);
    let mut stmt =
        conn.prepare_cached("SELECT saint_id, COUNT(*) FROM votes WHERE matchup_id = ?1 GROUP BY saint_id")?;
    let rows = stmt.query_map([matchup.id], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?;
    for row in rows {
        let (saint_id, count) = row?;
        if tally.saint_a == Some(saint_id) {
            tally.votes_a = count as u64;
        } else if tally.saint_b == Some(saint_id) {
            tally.votes_b = count as u64;
        }
    }
    Ok(tally)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket::{generate_bracket_structure, Bracket, BracketPlan};
    use crate::model::NewSaint;
    use crate::voting::fingerprint;
    use chrono::Duration;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn open_bracket(now: DateTime<Utc>) -> (Store, Bracket) {
        let store = Store::open_in_memory().unwrap();
        for name in ["Clare", "Francis", "Dominic", "Catherine"] {
            store.create_saint(&NewSaint::named(name)).unwrap();
        }
        let saints = store.list_saints(None, None).unwrap();
        let plan = BracketPlan::new(2026).with_size(4);
        let drawn = generate_bracket_structure(&saints, &plan, &mut StdRng::seed_from_u64(7)).unwrap();
        store.insert_bracket(&drawn, false).unwrap();
        let (bracket, ()) = store
            .update_bracket(2026, |b| {
                let m = b.matchup_mut(0, 0).unwrap();
                m.opens_at = Some(now - Duration::hours(1));
                m.closes_at = Some(now + Duration::hours(23));
                Ok(())
            })
            .unwrap();
        (store, bracket)
    }

    #[test]
    fn test_cast_vote_counts_once_per_device() {
        let now = Utc::now();
        let (store, bracket) = open_bracket(now);
        let m = bracket.matchup(0, 0).unwrap();
        let (a, b) = m.entrants().unwrap();

        let alice = fingerprint("salt", "198.51.100.1", "Firefox");
        let bob = fingerprint("salt", "198.51.100.2", "Firefox");

        let tally = store.cast_vote(m.id, a, &alice, now).unwrap();
        assert_eq!((tally.votes_a, tally.votes_b), (1, 0));
        assert!(store.has_voted(m.id, &alice).unwrap());
        assert!(!store.has_voted(m.id, &bob).unwrap());

        assert!(matches!(
            store.cast_vote(m.id, b, &alice, now),
            Err(SaintfestError::AlreadyVoted(_))
        ));

        let tally = store.cast_vote(m.id, b, &bob, now).unwrap();
        assert_eq!(tally.total(), 2);
        assert_eq!(store.tally(m).unwrap().leader(), None);
    }

    #[test]
    fn test_cast_vote_rejects_closed_and_unknown() {
        let now = Utc::now();
        let (store, bracket) = open_bracket(now);
        let open = bracket.matchup(0, 0).unwrap();
        let unscheduled = bracket.matchup(0, 1).unwrap();
        let voter = fingerprint("salt", "ip", "ua");

        assert!(matches!(
            store.cast_vote(unscheduled.id, unscheduled.saint_a.unwrap(), &voter, now),
            Err(SaintfestError::VotingClosed(_))
        ));
        assert!(matches!(
            store.cast_vote(open.id, open.saint_a.unwrap(), &voter, now + Duration::days(2)),
            Err(SaintfestError::VotingClosed(_))
        ));
        assert!(matches!(
            store.cast_vote(open.id, unscheduled.saint_a.unwrap(), &voter, now),
            Err(SaintfestError::Invalid(_))
        ));
        assert!(matches!(
            store.cast_vote(9999, 1, &voter, now),
            Err(SaintfestError::NotFound(_))
        ));
    }

    #[test]
    fn test_corrected_result_frees_votes_for_displaced_saint() {
        let now = Utc::now();
        let (store, bracket) = open_bracket(now);
        let left = bracket.matchup(0, 0).unwrap().clone();
        let right = bracket.matchup(0, 1).unwrap().clone();
        let (first_pick, corrected) = left.entrants().unwrap();

        store.close_matchup(left.id, Some(first_pick)).unwrap();
        store.close_matchup(right.id, right.saint_a).unwrap();
        let (bracket, ()) = store
            .update_bracket(2026, |b| {
                let last = b.matchup_mut(1, 0).unwrap();
                last.opens_at = Some(now - Duration::hours(1));
                last.closes_at = Some(now + Duration::hours(23));
                Ok(())
            })
            .unwrap();
        let final_id = bracket.matchup(1, 0).unwrap().id;

        let voter = fingerprint("salt", "203.0.113.7", "Firefox");
        store.cast_vote(final_id, first_pick, &voter, now).unwrap();

        let closed = store.close_matchup(left.id, Some(corrected)).unwrap();
        let last = closed.bracket.matchup(1, 0).unwrap();
        assert_eq!(last.saint_a, Some(corrected));
        assert!(!store.has_voted(final_id, &voter).unwrap());

        let tally = store.cast_vote(final_id, corrected, &voter, now).unwrap();
        assert_eq!(tally.total(), 1);
        assert_eq!(tally.votes_a, 1);
    }
}
