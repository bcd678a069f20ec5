//! Saint CRUD

use std::collections::BTreeSet;

use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rustc_hash::FxHashMap;

use super::{conflict_on_constraint, Store, UpsertOutcome};
use crate::error::{Result, SaintfestError};
use crate::model::{NewSaint, Saint, SaintCategory};

const SAINT_COLUMNS: &str = "id, slug, name, feast_day, patronage, biography, image_url, \
                             born, died, canonized, categories, created_at, updated_at";

fn saint_from_row(row: &Row<'_>) -> rusqlite::Result<Saint> {
    let categories_json: String = row.get(10)?;
    let categories: BTreeSet<SaintCategory> = serde_json::from_str(&categories_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(10, Type::Text, Box::new(e)))?;

    Ok(Saint {
        id: row.get(0)?,
        slug: row.get(1)?,
        name: row.get(2)?,
        feast_day: row.get(3)?,
        patronage: row.get(4)?,
        biography: row.get(5)?,
        image_url: row.get(6)?,
        born: row.get(7)?,
        died: row.get(8)?,
        canonized: row.get(9)?,
        categories,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn query_saint(conn: &Connection, clause: &str, key: &dyn rusqlite::ToSql) -> Result<Option<Saint>> {
    let sql = format!("SELECT {} FROM saints WHERE {}", SAINT_COLUMNS, clause);
    Ok(conn.query_row(&sql, [key], saint_from_row).optional()?)
}

impl Store {
    /// All saints ordered by name, optionally narrowed to a category and a
    /// case-insensitive name substring.
    pub fn list_saints(&self, category: Option<SaintCategory>, query: Option<&str>) -> Result<Vec<Saint>> {
        let conn = self.lock();
        let sql = format!("SELECT {} FROM saints ORDER BY name COLLATE NOCASE", SAINT_COLUMNS);
        let mut stmt = conn.prepare_cached(&sql)?;
        let saints = stmt
            .query_map([], saint_from_row)?
            .collect::<rusqlite::Result<Vec<Saint>>>()?;

        let needle = query
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty());

        Ok(saints
            .into_iter()
            .filter(|s| category.map_or(true, |c| s.has_category(c)))
            .filter(|s| {
                needle
                    .as_deref()
                    .map_or(true, |n| s.name.to_lowercase().contains(n))
            })
            .collect())
    }

    pub fn get_saint(&self, id: i64) -> Result<Option<Saint>> {
        let conn = self.lock();
        query_saint(&conn, "id = ?1", &id)
    }

    pub fn get_saint_by_slug(&self, slug: &str) -> Result<Option<Saint>> {
        let conn = self.lock();
        query_saint(&conn, "slug = ?1", &slug)
    }

    /// Saints for `ids`, in the order given. Unknown ids are an error.
    pub fn saints_by_ids(&self, ids: &[i64]) -> Result<Vec<Saint>> {
        let conn = self.lock();
        ids.iter()
            .map(|id| query_saint(&conn, "id = ?1", id)?.ok_or_else(|| SaintfestError::not_found("saint", id)))
            .collect()
    }

    /// Display names for `ids`; unknown ids are left out.
    pub fn saint_names(&self, ids: &[i64]) -> Result<FxHashMap<i64, String>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached("SELECT name FROM saints WHERE id = ?1")?;
        let mut names = FxHashMap::default();
        for id in ids {
            if let Some(name) = stmt.query_row([id], |row| row.get::<_, String>(0)).optional()? {
                names.insert(*id, name);
            }
        }
        Ok(names)
    }

    pub fn create_saint(&self, saint: &NewSaint) -> Result<Saint> {
        let saint = saint.clone().validated()?;
        let slug = saint.slug();
        let now = Utc::now();
        let categories = serde_json::to_string(&saint.categories)?;

        let conn = self.lock();
        conn.execute(
            "INSERT INTO saints (slug, name, feast_day, patronage, biography, image_url,
                                 born, died, canonized, categories, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
            params![
                slug,
                saint.name,
                saint.feast_day,
                saint.patronage,
                saint.biography,
                saint.image_url,
                saint.born,
                saint.died,
                saint.canonized,
                categories,
                now,
            ],
        )
        .map_err(|e| conflict_on_constraint(e, || format!("a saint with slug '{}' already exists", slug)))?;

        let id = conn.last_insert_rowid();
        tracing::debug!("Created saint {} ({})", id, slug);
        query_saint(&conn, "id = ?1", &id)?.ok_or_else(|| SaintfestError::not_found("saint", id))
    }

    pub fn update_saint(&self, id: i64, saint: &NewSaint) -> Result<Saint> {
        let saint = saint.clone().validated()?;
        let conn = self.lock();
        update_saint_row(&conn, id, &saint)?;
        query_saint(&conn, "id = ?1", &id)?.ok_or_else(|| SaintfestError::not_found("saint", id))
    }

    /// Refused with `Conflict` while the saint appears in a bracket.
    pub fn delete_saint(&self, id: i64) -> Result<()> {
        let conn = self.lock();
        let deleted = conn
            .execute("DELETE FROM saints WHERE id = ?1", [id])
            .map_err(|e| conflict_on_constraint(e, || format!("saint {} is part of a bracket", id)))?;
        if deleted == 0 {
            return Err(SaintfestError::not_found("saint", id));
        }
        Ok(())
    }

    /// Insert, or overwrite the saint with the same slug.
    pub fn upsert_saint(&self, saint: &NewSaint) -> Result<UpsertOutcome> {
        let validated = saint.clone().validated()?;
        let existing: Option<i64> = {
            let conn = self.lock();
            conn.query_row("SELECT id FROM saints WHERE slug = ?1", [validated.slug()], |row| row.get(0))
                .optional()?
        };

        match existing {
            Some(id) => {
                let conn = self.lock();
                update_saint_row(&conn, id, &validated)?;
                Ok(UpsertOutcome::Updated(id))
            }
            None => self.create_saint(&validated).map(|s| UpsertOutcome::Created(s.id)),
        }
    }

    pub fn saint_count(&self) -> Result<usize> {
        let conn = self.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM saints", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn update_saint_row(conn: &Connection, id: i64, saint: &NewSaint) -> Result<()> {
    let slug = saint.slug();
    let categories = serde_json::to_string(&saint.categories)?;
    let updated = conn
        .execute(
            "UPDATE saints SET slug = ?2, name = ?3, feast_day = ?4, patronage = ?5, biography = ?6,
                    image_url = ?7, born = ?8, died = ?9, canonized = ?10, categories = ?11,
                    updated_at = ?12
             WHERE id = ?1",
            params![
                id,
                slug,
                saint.name,
                saint.feast_day,
                saint.patronage,
                saint.biography,
                saint.image_url,
                saint.born,
                saint.died,
                saint.canonized,
                categories,
                Utc::now(),
            ],
        )
        .map_err(|e| conflict_on_constraint(e, || format!("a saint with slug '{}' already exists", slug)))?;

    if updated == 0 {
        return Err(SaintfestError::not_found("saint", id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use SaintCategory::*;

    fn seeded() -> Store {
        let store = Store::open_in_memory().unwrap();
        store
            .create_saint(&NewSaint::named("Perpetua").with_categories(&[Martyr]))
            .unwrap();
        store
            .create_saint(&NewSaint::named("Teresa of Avila").with_categories(&[Mystic, DoctorOfTheChurch]))
            .unwrap();
        store
            .create_saint(&NewSaint::named("Ambrose").with_categories(&[Bishop, DoctorOfTheChurch]))
            .unwrap();
        store
    }

    #[test]
    fn test_create_and_get() {
        let store = seeded();
        let teresa = store.get_saint_by_slug("teresa-of-avila").unwrap().unwrap();
        assert_eq!(teresa.name, "Teresa of Avila");
        assert!(teresa.has_category(Mystic));
        assert_eq!(store.get_saint(teresa.id).unwrap().unwrap(), teresa);
        assert!(store.get_saint(999).unwrap().is_none());
        assert_eq!(store.saint_count().unwrap(), 3);
    }

    #[test]
    fn test_duplicate_slug_conflicts() {
        let store = seeded();
        let err = store.create_saint(&NewSaint::named("perpetua")).unwrap_err();
        assert!(matches!(err, SaintfestError::Conflict(_)));
    }

    #[test]
    fn test_list_filters() {
        let store = seeded();
        let names = |saints: Vec<Saint>| saints.into_iter().map(|s| s.name).collect::<Vec<_>>();

        assert_eq!(
            names(store.list_saints(None, None).unwrap()),
            vec!["Ambrose", "Perpetua", "Teresa of Avila"]
        );
        assert_eq!(
            names(store.list_saints(Some(DoctorOfTheChurch), None).unwrap()),
            vec!["Ambrose", "Teresa of Avila"]
        );
        assert_eq!(names(store.list_saints(None, Some("TERESA")).unwrap()), vec!["Teresa of Avila"]);
        assert!(store.list_saints(Some(Martyr), Some("ambrose")).unwrap().is_empty());
    }

    #[test]
    fn test_update_and_delete() {
        let store = seeded();
        let ambrose = store.get_saint_by_slug("ambrose").unwrap().unwrap();

        let mut edit = NewSaint::named("Ambrose of Milan").with_categories(&[Bishop]);
        edit.feast_day = Some("December 7".to_string());
        let updated = store.update_saint(ambrose.id, &edit).unwrap();
        assert_eq!(updated.slug, "ambrose-of-milan");
        assert_eq!(updated.feast_day.as_deref(), Some("December 7"));
        assert!(!updated.has_category(DoctorOfTheChurch));
        assert_eq!(updated.created_at, ambrose.created_at);

        store.delete_saint(ambrose.id).unwrap();
        assert!(matches!(store.delete_saint(ambrose.id), Err(SaintfestError::NotFound(_))));
        assert!(matches!(
            store.update_saint(ambrose.id, &edit),
            Err(SaintfestError::NotFound(_))
        ));
    }

    #[test]
    fn test_saints_by_ids_and_names() {
        let store = seeded();
        let perpetua = store.get_saint_by_slug("perpetua").unwrap().unwrap();
        let ambrose = store.get_saint_by_slug("ambrose").unwrap().unwrap();

        let saints = store.saints_by_ids(&[ambrose.id, perpetua.id]).unwrap();
        assert_eq!(saints[0].name, "Ambrose");
        assert!(store.saints_by_ids(&[perpetua.id, 404]).is_err());

        let names = store.saint_names(&[perpetua.id, 404]).unwrap();
        assert_eq!(names.len(), 1);
        assert_eq!(names[&perpetua.id], "Perpetua");
    }

    #[test]
    fn test_upsert() {
        let store = seeded();
        let outcome = store.upsert_saint(&NewSaint::named("Perpetua").with_categories(&[Martyr, Layperson])).unwrap();
        assert!(matches!(outcome, UpsertOutcome::Updated(_)));
        let outcome = store.upsert_saint(&NewSaint::named("Felicity")).unwrap();
        assert!(matches!(outcome, UpsertOutcome::Created(_)));
        assert_eq!(store.saint_count().unwrap(), 4);
    }
}
