//! Numbered schema migrations tracked in `PRAGMA user_version`.

use rusqlite::Connection;

use crate::error::Result;

const V001_INITIAL: &str = "
CREATE TABLE saints (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    slug        TEXT NOT NULL UNIQUE,
    name        TEXT NOT NULL,
    feast_day   TEXT,
    patronage   TEXT,
    biography   TEXT,
    image_url   TEXT,
    born        TEXT,
    died        TEXT,
    canonized   TEXT,
    categories  TEXT NOT NULL DEFAULT '[]',
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE brackets (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    year        INTEGER NOT NULL UNIQUE,
    title       TEXT NOT NULL,
    size        INTEGER NOT NULL,
    regions     TEXT NOT NULL DEFAULT '[]',
    created_at  TEXT NOT NULL
);

CREATE TABLE matchups (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    bracket_id  INTEGER NOT NULL REFERENCES brackets(id) ON DELETE CASCADE,
    round       INTEGER NOT NULL,
    position    INTEGER NOT NULL,
    region      TEXT,
    saint_a     INTEGER REFERENCES saints(id),
    saint_b     INTEGER REFERENCES saints(id),
    winner      INTEGER REFERENCES saints(id),
    opens_at    TEXT,
    closes_at   TEXT,
    UNIQUE (bracket_id, round, position)
);

CREATE TABLE votes (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    matchup_id  INTEGER NOT NULL REFERENCES matchups(id) ON DELETE CASCADE,
    saint_id    INTEGER NOT NULL,
    fingerprint TEXT NOT NULL,
    cast_at     TEXT NOT NULL,
    UNIQUE (matchup_id, fingerprint)
);

CREATE TABLE posts (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    slug        TEXT NOT NULL UNIQUE,
    title       TEXT NOT NULL,
    body        TEXT NOT NULL,
    published   INTEGER NOT NULL DEFAULT 0,
    matchup_id  INTEGER REFERENCES matchups(id) ON DELETE SET NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
";

const V002_INDEXES: &str = "
CREATE INDEX idx_matchups_saint_a ON matchups (saint_a);
CREATE INDEX idx_matchups_saint_b ON matchups (saint_b);
CREATE INDEX idx_votes_matchup ON votes (matchup_id, saint_id);
CREATE INDEX idx_posts_published ON posts (published, created_at);
";

const MIGRATIONS: &[(u32, &str)] = &[(1, V001_INITIAL), (2, V002_INDEXES)];

pub const SCHEMA_VERSION: u32 = 2;

pub(super) fn run_migrations(conn: &Connection) -> Result<()> {
    let current: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    for (version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
        tracing::info!("Applied schema migration v{:03}", version);
    }
    Ok(())
}
