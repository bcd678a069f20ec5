//! SQLite persistence
//!
//! One connection behind a mutex; every public method takes the lock for the
//! duration of one logical operation, so a vote check-and-insert or a bracket
//! save is atomic with respect to other requests.

mod brackets;
mod migrations;
mod posts;
mod saints;
mod votes;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;

use crate::error::{Result, SaintfestError};

pub use brackets::ClosedMatchup;
pub use migrations::SCHEMA_VERSION;

/// Result of an insert-or-update keyed by slug.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created(i64),
    Updated(i64),
}

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Opening database {}", path.display());
        let conn = Connection::open(path)?;
        Self::initialize(conn)
    }

    /// Private in-memory database (tests, dry runs).
    pub fn open_in_memory() -> Result<Self> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> Result<Self> {
        apply_pragmas(&conn)?;
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // a panic while holding the lock leaves SQLite itself consistent
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn schema_version(&self) -> Result<u32> {
        let conn = self.lock();
        Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
    }
}

fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        PRAGMA foreign_keys = ON;
        ",
    )?;
    Ok(())
}

/// Map a constraint violation to `Conflict(message)`, pass anything else on.
fn conflict_on_constraint(err: rusqlite::Error, message: impl FnOnce() -> String) -> SaintfestError {
    let err = SaintfestError::from(err);
    if err.is_constraint_violation() {
        SaintfestError::Conflict(message())
    } else {
        err
    }
}
