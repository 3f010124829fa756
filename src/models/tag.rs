use std::collections::{HashMap, HashSet};

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::db::DbPool;

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct TagWithCount {
    pub id: i64,
    pub name: String,
    pub post_count: i64,
}

pub const MAX_TAG_LEN: usize = 50;

/// Trim names, drop empties and exact duplicates, keep first-seen order.
/// Names stay case-sensitive: "Rust" and "rust" are different tags.
pub fn normalize_names(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .filter(|n| seen.insert(n.to_string()))
        .map(str::to_string)
        .collect()
}

impl Tag {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Tag {
            id: row.get("id")?,
            name: row.get("name")?,
        })
    }

    pub fn find_by_id(pool: &DbPool, id: i64) -> Result<Option<Self>, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.query_row("SELECT id, name FROM tags WHERE id = ?1", params![id], Self::from_row)
            .optional()
            .map_err(|e| e.to_string())
    }

    pub fn find_by_name(pool: &DbPool, name: &str) -> Result<Option<Self>, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.query_row(
            "SELECT id, name FROM tags WHERE name = ?1",
            params![name],
            Self::from_row,
        )
        .optional()
        .map_err(|e| e.to_string())
    }

    pub fn list_with_counts(pool: &DbPool) -> Result<Vec<TagWithCount>, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let mut stmt = conn
            .prepare(
                "SELECT t.id, t.name, COUNT(pt.post_id) AS post_count
                 FROM tags t
                 LEFT JOIN post_tags pt ON pt.tag_id = t.id
                 GROUP BY t.id
                 ORDER BY t.name",
            )
            .map_err(|e| e.to_string())?;
        let rows = stmt
            .query_map([], |row| {
                Ok(TagWithCount {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    post_count: row.get(2)?,
                })
            })
            .map_err(|e| e.to_string())?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| e.to_string())
    }

    pub fn for_post(pool: &DbPool, post_id: i64) -> Result<Vec<Self>, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        Self::for_post_on(&conn, post_id).map_err(|e| e.to_string())
    }

    fn for_post_on(conn: &Connection, post_id: i64) -> rusqlite::Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT t.id, t.name FROM tags t
             JOIN post_tags pt ON pt.tag_id = t.id
             WHERE pt.post_id = ?1
             ORDER BY t.name",
        )?;
        let rows = stmt.query_map(params![post_id], Self::from_row)?;
        rows.collect()
    }

    fn find_or_create_on(conn: &Connection, name: &str) -> rusqlite::Result<i64> {
        let existing: Option<i64> = conn
            .query_row("SELECT id FROM tags WHERE name = ?1", params![name], |row| row.get(0))
            .optional()?;
        match existing {
            Some(id) => Ok(id),
            None => {
                conn.execute("INSERT INTO tags (name) VALUES (?1)", params![name])?;
                Ok(conn.last_insert_rowid())
            }
        }
    }

    pub fn find_or_create(pool: &DbPool, name: &str) -> Result<i64, String> {
        let name = name.trim();
        if name.is_empty() {
            return Err("tag name is empty".to_string());
        }
        let conn = pool.get().map_err(|e| e.to_string())?;
        Self::find_or_create_on(&conn, name).map_err(|e| e.to_string())
    }

    /// Replace the post's tag set with `names`.
    ///
    /// Links that are already correct are left untouched, missing tags are
    /// created, links to names no longer wanted are removed. Running it twice
    /// with the same input changes nothing the second time. Tag rows are never
    /// deleted here, so other posts keep theirs.
    pub fn set_for_post(pool: &DbPool, post_id: i64, names: &[String]) -> Result<Vec<Self>, String> {
        let mut conn = pool.get().map_err(|e| e.to_string())?;
        let tx = conn.transaction().map_err(|e| e.to_string())?;
        let result = Self::set_for_post_on(&tx, post_id, names).map_err(|e| e.to_string())?;
        tx.commit().map_err(|e| e.to_string())?;
        Ok(result)
    }

    /// `set_for_post` on a connection the caller already holds, normally inside
    /// the transaction that also writes the post.
    pub(crate) fn set_for_post_on(
        conn: &Connection,
        post_id: i64,
        names: &[String],
    ) -> rusqlite::Result<Vec<Self>> {
        let wanted = normalize_names(names);
        let current: HashMap<String, i64> = Self::for_post_on(conn, post_id)?
            .into_iter()
            .map(|t| (t.name, t.id))
            .collect();

        let wanted_set: HashSet<&str> = wanted.iter().map(String::as_str).collect();

        for (name, tag_id) in &current {
            if !wanted_set.contains(name.as_str()) {
                conn.execute(
                    "DELETE FROM post_tags WHERE post_id = ?1 AND tag_id = ?2",
                    params![post_id, tag_id],
                )?;
            }
        }

        for name in &wanted {
            if current.contains_key(name) {
                continue;
            }
            let tag_id = Self::find_or_create_on(conn, name)?;
            conn.execute(
                "INSERT OR IGNORE INTO post_tags (post_id, tag_id) VALUES (?1, ?2)",
                params![post_id, tag_id],
            )?;
        }

        Self::for_post_on(conn, post_id)
    }

    /// Removes the tag and, through the cascade, its links.
    pub fn delete(pool: &DbPool, id: i64) -> Result<bool, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let n = conn
            .execute("DELETE FROM tags WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        Ok(n > 0)
    }

    pub fn count(pool: &DbPool) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.query_row("SELECT COUNT(*) FROM tags", [], |row| row.get(0))
            .map_err(|e| e.to_string())
    }
}
