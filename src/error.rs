//! Domain error type shared by the store, bracket engine and importers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SaintfestError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    Invalid(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("A vote from this device was already recorded for matchup {0}")]
    AlreadyVoted(i64),

    #[error("Voting is closed for matchup {0}")]
    VotingClosed(i64),

    #[error("Matchup {0} is tied; an explicit winner is required")]
    Tie(i64),

    #[error("Import failed: {0}")]
    Import(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SaintfestError>;

impl SaintfestError {
    pub fn not_found(kind: &str, key: impl std::fmt::Display) -> Self {
        SaintfestError::NotFound(format!("{} {}", kind, key))
    }

    /// True when the underlying SQLite failure is a constraint violation
    /// (unique index or foreign key).
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            SaintfestError::Storage(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}
