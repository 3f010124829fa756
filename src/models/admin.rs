use rusqlite::{params, OptionalExtension};

use crate::db::DbPool;

/// Capability rows. Presence of a row is what grants admin privilege.
pub struct Admin;

impl Admin {
    pub fn role_for(pool: &DbPool, user_id: i64) -> Result<Option<String>, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.query_row(
            "SELECT role FROM admins WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| e.to_string())
    }

    pub fn assign(pool: &DbPool, user_id: i64, role: &str) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO admins (user_id, role) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET role = ?2",
            params![user_id, role],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn revoke(pool: &DbPool, user_id: i64) -> Result<bool, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let n = conn
            .execute("DELETE FROM admins WHERE user_id = ?1", params![user_id])
            .map_err(|e| e.to_string())?;
        Ok(n > 0)
    }

    pub fn count(pool: &DbPool) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.query_row("SELECT COUNT(*) FROM admins", [], |row| row.get(0))
            .map_err(|e| e.to_string())
    }
}
