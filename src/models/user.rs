use chrono::NaiveDateTime;
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;

use crate::db::DbPool;

#[derive(Debug, Serialize, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub profile_picture: Option<String>,
    pub bio: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

/// A user row joined with its capability row, for the admin user table.
#[derive(Debug, Serialize, Clone)]
pub struct UserListing {
    #[serde(flatten)]
    pub user: User,
    pub role: Option<String>,
}

impl User {
    const SELECT_COLS: &'static str =
        "u.id, u.username, u.email, u.password_hash, u.profile_picture, u.bio, u.is_active, u.created_at";

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            profile_picture: row.get(4)?,
            bio: row.get(5)?,
            is_active: row.get::<_, i64>(6)? != 0,
            created_at: row.get(7)?,
        })
    }

    // ── Lookups ──

    fn find_one(pool: &DbPool, column: &str, value: &dyn rusqlite::ToSql) -> Result<Option<User>, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.query_row(
            &format!("SELECT {} FROM users u WHERE u.{} = ?1", Self::SELECT_COLS, column),
            [value],
            Self::from_row,
        )
        .optional()
        .map_err(|e| e.to_string())
    }

    pub fn get_by_id(pool: &DbPool, id: i64) -> Result<Option<User>, String> {
        Self::find_one(pool, "id", &id)
    }

    pub fn get_by_username(pool: &DbPool, username: &str) -> Result<Option<User>, String> {
        Self::find_one(pool, "username", &username)
    }

    pub fn get_by_email(pool: &DbPool, email: &str) -> Result<Option<User>, String> {
        Self::find_one(pool, "email", &email)
    }

    pub fn username_taken(pool: &DbPool, username: &str) -> Result<bool, String> {
        Ok(Self::get_by_username(pool, username)?.is_some())
    }

    /// True when another account (not `except`) already uses this email.
    pub fn email_taken(pool: &DbPool, email: &str, except: Option<i64>) -> Result<bool, String> {
        Ok(Self::get_by_email(pool, email)?
            .map(|u| Some(u.id) != except)
            .unwrap_or(false))
    }

    pub fn list_with_roles(pool: &DbPool, limit: i64, offset: i64) -> Result<Vec<UserListing>, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {}, a.role FROM users u
                 LEFT JOIN admins a ON a.user_id = u.id
                 ORDER BY u.id ASC LIMIT ?1 OFFSET ?2",
                Self::SELECT_COLS
            ))
            .map_err(|e| e.to_string())?;
        let rows = stmt
            .query_map(params![limit, offset], |row| {
                Ok(UserListing {
                    user: Self::from_row(row)?,
                    role: row.get(8)?,
                })
            })
            .map_err(|e| e.to_string())?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| e.to_string())
    }

    pub fn recent(pool: &DbPool, limit: i64) -> Result<Vec<User>, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM users u ORDER BY u.created_at DESC, u.id DESC LIMIT ?1",
                Self::SELECT_COLS
            ))
            .map_err(|e| e.to_string())?;
        let rows = stmt
            .query_map(params![limit], Self::from_row)
            .map_err(|e| e.to_string())?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| e.to_string())
    }

    pub fn count(pool: &DbPool) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .map_err(|e| e.to_string())
    }

    pub fn salt_for(pool: &DbPool, user_id: i64) -> Result<Option<String>, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.query_row(
            "SELECT salt FROM salts WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| e.to_string())
    }

    pub fn published_post_count(pool: &DbPool, user_id: i64) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.query_row(
            "SELECT COUNT(*) FROM blog_posts WHERE author_id = ?1 AND status = 'published'",
            params![user_id],
            |row| row.get(0),
        )
        .map_err(|e| e.to_string())
    }

    // ── Create ──

    /// Insert the user and its salt row together.
    pub fn create(
        pool: &DbPool,
        username: &str,
        email: &str,
        password_hash: &str,
        salt: &str,
    ) -> Result<i64, String> {
        let mut conn = pool.get().map_err(|e| e.to_string())?;
        let tx = conn.transaction().map_err(|e| e.to_string())?;
        tx.execute(
            "INSERT INTO users (username, email, password_hash, is_active) VALUES (?1, ?2, ?3, 1)",
            params![username, email, password_hash],
        )
        .map_err(|e| e.to_string())?;
        let id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO salts (user_id, salt) VALUES (?1, ?2)",
            params![id, salt],
        )
        .map_err(|e| e.to_string())?;
        tx.commit().map_err(|e| e.to_string())?;
        Ok(id)
    }

    // ── Update ──

    pub fn update_profile(
        pool: &DbPool,
        id: i64,
        email: &str,
        bio: Option<&str>,
        profile_picture: Option<&str>,
    ) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE users SET email = ?1, bio = ?2, profile_picture = ?3 WHERE id = ?4",
            params![email, bio, profile_picture, id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Replace the hash and salt together so they never drift apart.
    pub fn update_password(pool: &DbPool, id: i64, password_hash: &str, salt: &str) -> Result<(), String> {
        let mut conn = pool.get().map_err(|e| e.to_string())?;
        let tx = conn.transaction().map_err(|e| e.to_string())?;
        tx.execute(
            "UPDATE users SET password_hash = ?1 WHERE id = ?2",
            params![password_hash, id],
        )
        .map_err(|e| e.to_string())?;
        tx.execute(
            "INSERT INTO salts (user_id, salt) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET salt = ?2",
            params![id, salt],
        )
        .map_err(|e| e.to_string())?;
        tx.commit().map_err(|e| e.to_string())
    }

    /// Deactivating also drops the user's sessions.
    pub fn set_active(pool: &DbPool, id: i64, active: bool) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE users SET is_active = ?1 WHERE id = ?2",
            params![active as i64, id],
        )
        .map_err(|e| e.to_string())?;
        if !active {
            conn.execute("DELETE FROM sessions WHERE user_id = ?1", params![id])
                .map_err(|e| e.to_string())?;
        }
        Ok(())
    }

    // ── Delete ──

    /// Hard delete. Posts, comments, reactions, sessions, salt and admin row cascade.
    pub fn delete(pool: &DbPool, id: i64) -> Result<bool, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let n = conn
            .execute("DELETE FROM users WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        Ok(n > 0)
    }

    // ── Helpers ──

    /// Public-facing profile, no email or password material.
    pub fn public_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "username": self.username,
            "profile_picture": self.profile_picture,
            "bio": self.bio,
            "created_at": self.created_at,
        })
    }
}
