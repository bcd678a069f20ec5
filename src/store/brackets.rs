//! Brackets and their matchups

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::votes::tally_with;
use super::{conflict_on_constraint, Store};
use crate::bracket::{decide_winner, Bracket, BracketSummary, Matchup, MatchupState};
use crate::error::{Result, SaintfestError};
use crate::voting::VoteTally;

const MATCHUP_COLUMNS: &str = "m.id, m.round, m.position, m.region, m.saint_a, m.saint_b, m.winner, \
                               m.opens_at, m.closes_at, b.year";

fn matchup_from_row(row: &Row<'_>) -> rusqlite::Result<(i32, Matchup)> {
    let round: i64 = row.get(1)?;
    let position: i64 = row.get(2)?;
    Ok((
        row.get(9)?,
        Matchup {
            id: row.get(0)?,
            round: round as usize,
            position: position as usize,
            region: row.get(3)?,
            saint_a: row.get(4)?,
            saint_b: row.get(5)?,
            winner: row.get(6)?,
            opens_at: row.get(7)?,
            closes_at: row.get(8)?,
        },
    ))
}

/// Outcome of [`Store::close_matchup`].
#[derive(Debug, Clone)]
pub struct ClosedMatchup {
    pub year: i32,
    pub winner: i64,
    pub tally: VoteTally,
    /// (round, position) of every matchup the result touched.
    pub changed: Vec<(usize, usize)>,
    pub bracket: Bracket,
}

fn matchup_by_id(conn: &Connection, matchup_id: i64) -> Result<Option<(i32, Matchup)>> {
    let sql = format!(
        "SELECT {} FROM matchups m JOIN brackets b ON b.id = m.bracket_id WHERE m.id = ?1",
        MATCHUP_COLUMNS
    );
    Ok(conn.query_row(&sql, [matchup_id], matchup_from_row).optional()?)
}

fn load_bracket(conn: &Connection, year: i32) -> Result<Option<Bracket>> {
    let header = conn
        .query_row(
            "SELECT id, title, size, regions, created_at FROM brackets WHERE year = ?1",
            [year],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, DateTime<Utc>>(4)?,
                ))
            },
        )
        .optional()?;

    let Some((id, title, size, regions_json, created_at)) = header else {
        return Ok(None);
    };

    let regions: Vec<String> = serde_json::from_str(&regions_json)?;
    let mut bracket = Bracket::empty(year, &title, size as usize, regions)?;
    bracket.id = id;
    bracket.created_at = created_at;

    let sql = format!(
        "SELECT {} FROM matchups m JOIN brackets b ON b.id = m.bracket_id
         WHERE m.bracket_id = ?1 ORDER BY m.round, m.position",
        MATCHUP_COLUMNS
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt.query_map([id], matchup_from_row)?;
    for row in rows {
        let (_, matchup) = row?;
        let slot = bracket
            .matchup_mut(matchup.round, matchup.position)
            .ok_or_else(|| {
                SaintfestError::Invalid(format!(
                    "stored matchup {} at {}/{} does not fit a bracket of {}",
                    matchup.id, matchup.round, matchup.position, size
                ))
            })?;
        *slot = matchup;
    }
    Ok(Some(bracket))
}

fn insert_matchups(conn: &Connection, bracket: &mut Bracket) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO matchups (bracket_id, round, position, region, saint_a, saint_b, winner, opens_at, closes_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;
    let bracket_id = bracket.id;
    for round in bracket.rounds.iter_mut() {
        for m in round.matchups.iter_mut() {
            stmt.execute(params![
                bracket_id,
                m.round as i64,
                m.position as i64,
                m.region,
                m.saint_a,
                m.saint_b,
                m.winner,
                m.opens_at,
                m.closes_at,
            ])?;
            m.id = conn.last_insert_rowid();
        }
    }
    Ok(())
}

/// Write the matchups of `after` that differ from `before`. A saint moved out
/// of a slot takes the votes cast for them in that matchup along, so their
/// voters can vote again.
fn write_changes(conn: &Connection, before: &Bracket, after: &Bracket) -> Result<usize> {
    let mut update = conn.prepare_cached(
        "UPDATE matchups SET saint_a = ?2, saint_b = ?3, winner = ?4, opens_at = ?5, closes_at = ?6
         WHERE id = ?1 AND bracket_id = ?7",
    )?;
    let mut drop_votes = conn.prepare_cached("DELETE FROM votes WHERE matchup_id = ?1 AND saint_id = ?2")?;

    let mut written = 0;
    for (old, new) in before.matchups().zip(after.matchups()) {
        if old.id != new.id {
            return Err(SaintfestError::Invalid(format!(
                "matchup {} cannot replace matchup {}",
                new.id, old.id
            )));
        }
        if old == new {
            continue;
        }

        let updated = update.execute(params![
            new.id,
            new.saint_a,
            new.saint_b,
            new.winner,
            new.opens_at,
            new.closes_at,
            after.id,
        ])?;
        if updated == 0 {
            return Err(SaintfestError::not_found("matchup", new.id));
        }

        for displaced in [old.saint_a, old.saint_b]
            .into_iter()
            .flatten()
            .filter(|id| !new.involves(*id))
        {
            let removed = drop_votes.execute(params![new.id, displaced])?;
            if removed > 0 {
                tracing::warn!(
                    "Dropped {} votes for saint {} displaced from matchup {}",
                    removed,
                    displaced,
                    new.id
                );
            }
        }
        written += 1;
    }
    Ok(written)
}

impl Store {
    /// Persist a freshly drawn bracket, assigning row ids. With `replace`, an
    /// existing bracket for the same year is deleted first (votes included).
    pub fn insert_bracket(&self, bracket: &Bracket, replace: bool) -> Result<Bracket> {
        let mut bracket = bracket.clone();
        let regions = serde_json::to_string(&bracket.regions)?;

        let conn = self.lock();
        let tx = conn.unchecked_transaction()?;
        if replace {
            let removed = tx.execute("DELETE FROM brackets WHERE year = ?1", [bracket.year])?;
            if removed > 0 {
                tracing::warn!("Replacing existing bracket for {}", bracket.year);
            }
        }

        tx.execute(
            "INSERT INTO brackets (year, title, size, regions, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![bracket.year, bracket.title, bracket.size as i64, regions, bracket.created_at],
        )
        .map_err(|e| conflict_on_constraint(e, || format!("a bracket for {} already exists", bracket.year)))?;
        bracket.id = tx.last_insert_rowid();

        insert_matchups(&tx, &mut bracket)?;
        tx.commit()?;

        tracing::info!(
            "Saved bracket {} ({} matchups)",
            bracket.year,
            bracket.matchups().count()
        );
        Ok(bracket)
    }

    pub fn get_bracket(&self, year: i32) -> Result<Option<Bracket>> {
        let conn = self.lock();
        load_bracket(&conn, year)
    }

    /// Bracket with the highest year.
    pub fn latest_bracket(&self) -> Result<Option<Bracket>> {
        let conn = self.lock();
        let year: Option<i32> = conn.query_row("SELECT MAX(year) FROM brackets", [], |row| row.get(0))?;
        match year {
            Some(year) => load_bracket(&conn, year),
            None => Ok(None),
        }
    }

    pub fn list_brackets(&self) -> Result<Vec<BracketSummary>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare_cached("SELECT id, year, title, size, created_at FROM brackets ORDER BY year DESC")?;
        let summaries = stmt
            .query_map([], |row| {
                Ok(BracketSummary {
                    id: row.get(0)?,
                    year: row.get(1)?,
                    title: row.get(2)?,
                    size: row.get::<_, i64>(3)? as usize,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(summaries)
    }

    pub fn delete_bracket(&self, year: i32) -> Result<()> {
        let conn = self.lock();
        let removed = conn.execute("DELETE FROM brackets WHERE year = ?1", [year])?;
        if removed == 0 {
            return Err(SaintfestError::not_found("bracket", year));
        }
        tracing::info!("Deleted bracket {}", year);
        Ok(())
    }

    /// Load a bracket, change it with `update` and write back the matchups
    /// that differ, all in one transaction under the store lock.
    ///
    /// `update` must not call back into the store.
    pub fn update_bracket<T>(&self, year: i32, update: impl FnOnce(&mut Bracket) -> Result<T>) -> Result<(Bracket, T)> {
        let conn = self.lock();
        let tx = conn.unchecked_transaction()?;
        let before = load_bracket(&tx, year)?.ok_or_else(|| SaintfestError::not_found("bracket", year))?;

        let mut bracket = before.clone();
        let output = update(&mut bracket)?;
        write_changes(&tx, &before, &bracket)?;
        tx.commit()?;
        Ok((bracket, output))
    }

    /// Decide a matchup from its tally (or `override_winner`) and carry the
    /// winner forward. Tally, decision and write share one transaction.
    pub fn close_matchup(&self, matchup_id: i64, override_winner: Option<i64>) -> Result<ClosedMatchup> {
        let conn = self.lock();
        let tx = conn.unchecked_transaction()?;
        let (year, matchup) =
            matchup_by_id(&tx, matchup_id)?.ok_or_else(|| SaintfestError::not_found("matchup", matchup_id))?;
        let before = load_bracket(&tx, year)?.ok_or_else(|| SaintfestError::not_found("bracket", year))?;

        let tally = tally_with(&tx, &matchup)?;
        let winner = decide_winner(&matchup, &tally, override_winner)?;
        let mut bracket = before.clone();
        let changed = bracket.record_winner(matchup.round, matchup.position, winner)?;
        write_changes(&tx, &before, &bracket)?;
        tx.commit()?;

        Ok(ClosedMatchup {
            year,
            winner,
            tally,
            changed,
            bracket,
        })
    }

    /// A matchup with the year of its bracket.
    pub fn get_matchup(&self, matchup_id: i64) -> Result<Option<(i32, Matchup)>> {
        let conn = self.lock();
        matchup_by_id(&conn, matchup_id)
    }

    /// Matchups whose voting session is running at `now`.
    pub fn open_matchups(&self, now: DateTime<Utc>) -> Result<Vec<(i32, Matchup)>> {
        let conn = self.lock();
        let sql = format!(
            "SELECT {} FROM matchups m JOIN brackets b ON b.id = m.bracket_id
             WHERE m.winner IS NULL AND m.opens_at IS NOT NULL
             ORDER BY b.year DESC, m.round, m.position",
            MATCHUP_COLUMNS
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let all = stmt
            .query_map([], matchup_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(all
            .into_iter()
            .filter(|(_, m)| m.state_at(now) == MatchupState::Open)
            .collect())
    }

    /// Every matchup a saint has been drawn into, newest bracket first.
    pub fn saint_matchups(&self, saint_id: i64) -> Result<Vec<(i32, Matchup)>> {
        let conn = self.lock();
        let sql = format!(
            "SELECT {} FROM matchups m JOIN brackets b ON b.id = m.bracket_id
             WHERE m.saint_a = ?1 OR m.saint_b = ?1
             ORDER BY b.year DESC, m.round",
            MATCHUP_COLUMNS
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt
            .query_map([saint_id], matchup_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
