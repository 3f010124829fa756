use chrono::NaiveDateTime;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbPool;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    /// Computed at read time, not a stored counter.
    pub post_count: i64,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CategoryForm {
    pub name: String,
    pub description: Option<String>,
}

/// Outcome of a guarded delete.
#[derive(Debug, PartialEq, Eq)]
pub enum CategoryDelete {
    Deleted,
    NotFound,
    InUse(i64),
}

impl Category {
    const SELECT: &'static str = "SELECT c.id, c.name, c.description, c.created_at, COUNT(p.id) AS post_count
         FROM categories c
         LEFT JOIN blog_posts p ON p.category_id = c.id";

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Category {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            post_count: row.get("post_count")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn find_by_id(pool: &DbPool, id: i64) -> Result<Option<Self>, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.query_row(
            &format!("{} WHERE c.id = ?1 GROUP BY c.id", Self::SELECT),
            params![id],
            Self::from_row,
        )
        .optional()
        .map_err(|e| e.to_string())
    }

    pub fn list(pool: &DbPool) -> Result<Vec<Self>, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let mut stmt = conn
            .prepare(&format!("{} GROUP BY c.id ORDER BY c.name", Self::SELECT))
            .map_err(|e| e.to_string())?;
        let rows = stmt
            .query_map([], Self::from_row)
            .map_err(|e| e.to_string())?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| e.to_string())
    }

    pub fn exists(pool: &DbPool, id: i64) -> Result<bool, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM categories WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .map_err(|e| e.to_string())?;
        Ok(n > 0)
    }

    /// True when a different category (not `except`) already has this name.
    pub fn name_taken(pool: &DbPool, name: &str, except: Option<i64>) -> Result<bool, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT id FROM categories WHERE name = ?1",
                params![name.trim()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| e.to_string())?;
        Ok(matches!(found, Some(id) if Some(id) != except))
    }

    pub fn count(pool: &DbPool) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.query_row("SELECT COUNT(*) FROM categories", [], |row| row.get(0))
            .map_err(|e| e.to_string())
    }

    pub fn create(pool: &DbPool, form: &CategoryForm) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO categories (name, description) VALUES (?1, ?2)",
            params![form.name.trim(), form.description],
        )
        .map_err(|e| e.to_string())?;
        Ok(conn.last_insert_rowid())
    }

    pub fn update(pool: &DbPool, id: i64, form: &CategoryForm) -> Result<bool, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let n = conn
            .execute(
                "UPDATE categories SET name = ?1, description = ?2 WHERE id = ?3",
                params![form.name.trim(), form.description, id],
            )
            .map_err(|e| e.to_string())?;
        Ok(n > 0)
    }

    /// Refuses while any post references the category. Check and delete are
    /// two statements, so two concurrent admins can race; last writer wins.
    pub fn delete(pool: &DbPool, id: i64) -> Result<CategoryDelete, String> {
        let category = match Self::find_by_id(pool, id)? {
            Some(c) => c,
            None => return Ok(CategoryDelete::NotFound),
        };
        if category.post_count > 0 {
            return Ok(CategoryDelete::InUse(category.post_count));
        }
        let conn = pool.get().map_err(|e| e.to_string())?;
        let n = conn
            .execute("DELETE FROM categories WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        Ok(if n > 0 {
            CategoryDelete::Deleted
        } else {
            CategoryDelete::NotFound
        })
    }
}
