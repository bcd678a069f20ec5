//! Daily voting sessions
//!
//! Matchups of a round open `per_day` at a time, one batch per day, in
//! position order. Each session stays open for `session`.

use chrono::{DateTime, Duration, Utc};

use super::Bracket;
use crate::error::{Result, SaintfestError};

fn check_params(per_day: usize, session: Duration) -> Result<()> {
    if per_day == 0 {
        return Err(SaintfestError::Invalid("at least one matchup per day is required".to_string()));
    }
    if session < Duration::minutes(1) || session > Duration::days(7) {
        return Err(SaintfestError::Invalid(format!(
            "voting session must last between 1 minute and 7 days, got {} minutes",
            session.num_minutes()
        )));
    }
    Ok(())
}

/// `start` plus whole days, or `Invalid` past the representable date range.
fn days_after(start: DateTime<Utc>, days: usize) -> Result<DateTime<Utc>> {
    i64::try_from(days)
        .ok()
        .and_then(Duration::try_days)
        .and_then(|offset| start.checked_add_signed(offset))
        .ok_or_else(|| out_of_range(start))
}

fn out_of_range(start: DateTime<Utc>) -> SaintfestError {
    SaintfestError::Invalid(format!("a schedule starting {} runs past the supported date range", start))
}

/// Schedule one round starting at `start`.
///
/// Decided matchups keep their window. Returns the start of the day after the
/// round's last voting day.
pub fn schedule_round(
    bracket: &mut Bracket,
    round: usize,
    start: DateTime<Utc>,
    per_day: usize,
    session: Duration,
) -> Result<DateTime<Utc>> {
    check_params(per_day, session)?;

    let matchups = &mut bracket
        .rounds
        .get_mut(round)
        .ok_or_else(|| SaintfestError::Invalid(format!("bracket has no round {}", round)))?
        .matchups;

    for (i, matchup) in matchups.iter_mut().enumerate() {
        if matchup.winner.is_some() {
            continue;
        }
        let opens = days_after(start, i / per_day)?;
        let closes = opens.checked_add_signed(session).ok_or_else(|| out_of_range(start))?;
        matchup.opens_at = Some(opens);
        matchup.closes_at = Some(closes);
    }

    days_after(start, matchups.len().div_ceil(per_day))
}

/// Schedule every round back to back from `start`.
pub fn schedule_tournament(
    bracket: &mut Bracket,
    start: DateTime<Utc>,
    per_day: usize,
    session: Duration,
) -> Result<()> {
    check_params(per_day, session)?;

    let mut next_start = start;
    for round in 0..bracket.rounds.len() {
        next_start = schedule_round(bracket, round, next_start, per_day, session)?;
    }
    tracing::debug!(
        "Scheduled {} rounds of {} from {} to {}",
        bracket.rounds.len(),
        bracket.year,
        start,
        next_start
    );
    Ok(())
}
