//! Blog posts

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{conflict_on_constraint, Store};
use crate::error::{Result, SaintfestError};
use crate::model::{Post, PostDraft};

const POST_COLUMNS: &str = "id, slug, title, body, published, matchup_id, created_at, updated_at";

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        slug: row.get(1)?,
        title: row.get(2)?,
        body: row.get(3)?,
        published: row.get(4)?,
        matchup_id: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn query_post(conn: &Connection, clause: &str, key: &dyn rusqlite::ToSql) -> Result<Option<Post>> {
    let sql = format!("SELECT {} FROM posts WHERE {}", POST_COLUMNS, clause);
    Ok(conn.query_row(&sql, [key], post_from_row).optional()?)
}

/// Foreign key failures here can only come from `matchup_id`.
fn post_write_error(err: rusqlite::Error, draft: &PostDraft) -> SaintfestError {
    let slug = draft.resolved_slug();
    let matchup = draft.matchup_id;
    conflict_on_constraint(err, || match matchup {
        Some(id) => format!("slug '{}' is taken or matchup {} does not exist", slug, id),
        None => format!("a post with slug '{}' already exists", slug),
    })
}

impl Store {
    /// Newest first. Drafts only when asked for.
    pub fn list_posts(&self, include_drafts: bool) -> Result<Vec<Post>> {
        let conn = self.lock();
        let sql = format!(
            "SELECT {} FROM posts WHERE published = 1 OR ?1 ORDER BY created_at DESC, id DESC",
            POST_COLUMNS
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let posts = stmt
            .query_map([include_drafts], post_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(posts)
    }

    pub fn get_post(&self, id: i64) -> Result<Option<Post>> {
        let conn = self.lock();
        query_post(&conn, "id = ?1", &id)
    }

    pub fn get_post_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        let conn = self.lock();
        query_post(&conn, "slug = ?1", &slug)
    }

    /// Published posts attached to a matchup.
    pub fn posts_for_matchup(&self, matchup_id: i64) -> Result<Vec<Post>> {
        let conn = self.lock();
        let sql = format!(
            "SELECT {} FROM posts WHERE matchup_id = ?1 AND published = 1 ORDER BY created_at",
            POST_COLUMNS
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let posts = stmt
            .query_map([matchup_id], post_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(posts)
    }

    pub fn create_post(&self, draft: &PostDraft) -> Result<Post> {
        let draft = draft.clone().validated()?;
        let now = Utc::now();
        let conn = self.lock();
        conn.execute(
            "INSERT INTO posts (slug, title, body, published, matchup_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                draft.resolved_slug(),
                draft.title,
                draft.body,
                draft.published,
                draft.matchup_id,
                now
            ],
        )
        .map_err(|e| post_write_error(e, &draft))?;

        let id = conn.last_insert_rowid();
        tracing::debug!("Created post {} ({})", id, draft.resolved_slug());
        query_post(&conn, "id = ?1", &id)?.ok_or_else(|| SaintfestError::not_found("post", id))
    }

    pub fn update_post(&self, id: i64, draft: &PostDraft) -> Result<Post> {
        let draft = draft.clone().validated()?;
        let conn = self.lock();
        let updated = conn
            .execute(
                "UPDATE posts SET slug = ?2, title = ?3, body = ?4, published = ?5, matchup_id = ?6,
                        updated_at = ?7
                 WHERE id = ?1",
                params![
                    id,
                    draft.resolved_slug(),
                    draft.title,
                    draft.body,
                    draft.published,
                    draft.matchup_id,
                    Utc::now()
                ],
            )
            .map_err(|e| post_write_error(e, &draft))?;
        if updated == 0 {
            return Err(SaintfestError::not_found("post", id));
        }
        query_post(&conn, "id = ?1", &id)?.ok_or_else(|| SaintfestError::not_found("post", id))
    }

    pub fn delete_post(&self, id: i64) -> Result<()> {
        let conn = self.lock();
        if conn.execute("DELETE FROM posts WHERE id = ?1", [id])? == 0 {
            return Err(SaintfestError::not_found("post", id));
        }
        Ok(())
    }
}
