use std::collections::HashMap;

use chrono::NaiveDateTime;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbPool;

#[derive(Debug, Serialize, Clone)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub username: String,
    pub parent_comment_id: Option<i64>,
    pub content: String,
    pub is_approved: bool,
    pub created_at: NaiveDateTime,
}

/// A top-level comment with its direct replies. Threads are one level deep.
#[derive(Debug, Serialize, Clone)]
pub struct CommentThread {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<Comment>,
}

#[derive(Debug, Deserialize)]
pub struct CommentForm {
    pub post_id: i64,
    pub content: String,
    pub parent_comment_id: Option<i64>,
}

/// How new comments are approved, from the `comments_moderation` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalPolicy {
    /// Every comment is approved on creation.
    Auto,
    /// Admins' comments are approved, everyone else waits for moderation.
    Trusted,
    /// Every comment waits for moderation.
    Manual,
}

impl ApprovalPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "auto" | "auto-approve" => Some(ApprovalPolicy::Auto),
            "trusted" => Some(ApprovalPolicy::Trusted),
            "manual" => Some(ApprovalPolicy::Manual),
            _ => None,
        }
    }

    pub fn approves(&self, author_is_admin: bool) -> bool {
        match self {
            ApprovalPolicy::Auto => true,
            ApprovalPolicy::Trusted => author_is_admin,
            ApprovalPolicy::Manual => false,
        }
    }
}

impl Comment {
    const SELECT: &'static str = "SELECT c.id, c.post_id, c.user_id, u.username, c.parent_comment_id,
                c.content, c.is_approved, c.created_at
         FROM comments c
         JOIN users u ON u.id = c.user_id";

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Comment {
            id: row.get("id")?,
            post_id: row.get("post_id")?,
            user_id: row.get("user_id")?,
            username: row.get("username")?,
            parent_comment_id: row.get("parent_comment_id")?,
            content: row.get("content")?,
            is_approved: row.get::<_, i64>("is_approved")? != 0,
            created_at: row.get("created_at")?,
        })
    }

    pub fn find_by_id(pool: &DbPool, id: i64) -> Result<Option<Self>, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.query_row(
            &format!("{} WHERE c.id = ?1", Self::SELECT),
            params![id],
            Self::from_row,
        )
        .optional()
        .map_err(|e| e.to_string())
    }

    /// Top-level comments for a post with their replies nested under them,
    /// oldest first. Without `include_unapproved`, unapproved comments are
    /// hidden, and so are the replies of a hidden top-level comment.
    pub fn threads_for_post(
        pool: &DbPool,
        post_id: i64,
        include_unapproved: bool,
    ) -> Result<Vec<CommentThread>, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let sql = if include_unapproved {
            format!("{} WHERE c.post_id = ?1 ORDER BY c.created_at ASC, c.id ASC", Self::SELECT)
        } else {
            format!(
                "{} WHERE c.post_id = ?1 AND c.is_approved = 1 ORDER BY c.created_at ASC, c.id ASC",
                Self::SELECT
            )
        };
        let mut stmt = conn.prepare(&sql).map_err(|e| e.to_string())?;
        let comments = stmt
            .query_map(params![post_id], Self::from_row)
            .map_err(|e| e.to_string())?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| e.to_string())?;

        Ok(thread(comments))
    }

    pub fn list(pool: &DbPool, approved: Option<bool>, limit: i64, offset: i64) -> Result<Vec<Self>, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let rows = match approved {
            Some(a) => {
                let mut stmt = conn
                    .prepare(&format!(
                        "{} WHERE c.is_approved = ?1 ORDER BY c.created_at DESC, c.id DESC LIMIT ?2 OFFSET ?3",
                        Self::SELECT
                    ))
                    .map_err(|e| e.to_string())?;
                let rows = stmt
                    .query_map(params![a as i64, limit, offset], Self::from_row)
                    .map_err(|e| e.to_string())?
                    .collect::<rusqlite::Result<Vec<_>>>();
                rows
            }
            None => {
                let mut stmt = conn
                    .prepare(&format!(
                        "{} ORDER BY c.created_at DESC, c.id DESC LIMIT ?1 OFFSET ?2",
                        Self::SELECT
                    ))
                    .map_err(|e| e.to_string())?;
                let rows = stmt
                    .query_map(params![limit, offset], Self::from_row)
                    .map_err(|e| e.to_string())?
                    .collect::<rusqlite::Result<Vec<_>>>();
                rows
            }
        };
        rows.map_err(|e| e.to_string())
    }

    pub fn count(pool: &DbPool, approved: Option<bool>) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        match approved {
            Some(a) => conn.query_row(
                "SELECT COUNT(*) FROM comments WHERE is_approved = ?1",
                params![a as i64],
                |row| row.get(0),
            ),
            None => conn.query_row("SELECT COUNT(*) FROM comments", [], |row| row.get(0)),
        }
        .map_err(|e| e.to_string())
    }

    pub fn create(
        pool: &DbPool,
        user_id: i64,
        form: &CommentForm,
        approved: bool,
    ) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO comments (post_id, user_id, parent_comment_id, content, is_approved)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                form.post_id,
                user_id,
                form.parent_comment_id,
                form.content.trim(),
                approved as i64
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(conn.last_insert_rowid())
    }

    pub fn update_content(pool: &DbPool, id: i64, content: &str) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE comments SET content = ?1 WHERE id = ?2",
            params![content.trim(), id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn set_approved(pool: &DbPool, id: i64, approved: bool) -> Result<bool, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let n = conn
            .execute(
                "UPDATE comments SET is_approved = ?1 WHERE id = ?2",
                params![approved as i64, id],
            )
            .map_err(|e| e.to_string())?;
        Ok(n > 0)
    }

    /// Replies go with it (ON DELETE CASCADE).
    pub fn delete(pool: &DbPool, id: i64) -> Result<bool, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let n = conn
            .execute("DELETE FROM comments WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        Ok(n > 0)
    }
}

/// Group a flat, oldest-first list into top-level threads. Replies whose
/// parent is not in the list (hidden or itself a reply) are dropped.
fn thread(comments: Vec<Comment>) -> Vec<CommentThread> {
    let mut replies: HashMap<i64, Vec<Comment>> = HashMap::new();
    let mut top = Vec::new();
    for c in comments {
        match c.parent_comment_id {
            Some(parent) => replies.entry(parent).or_default().push(c),
            None => top.push(c),
        }
    }
    top.into_iter()
        .map(|comment| CommentThread {
            replies: replies.remove(&comment.id).unwrap_or_default(),
            comment,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(id: i64, parent: Option<i64>) -> Comment {
        Comment {
            id,
            post_id: 1,
            user_id: 1,
            username: "u".into(),
            parent_comment_id: parent,
            content: format!("c{}", id),
            is_approved: true,
            created_at: chrono::NaiveDate::from_ymd_opt(2026, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn thread_nests_one_level() {
        let threads = thread(vec![c(1, None), c(2, Some(1)), c(3, None), c(4, Some(1)), c(5, Some(99))]);
        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].comment.id, 1);
        assert_eq!(
            threads[0].replies.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![2, 4]
        );
        assert!(threads[1].replies.is_empty());
    }

    #[test]
    fn approval_policy() {
        assert!(ApprovalPolicy::Auto.approves(false));
        assert!(ApprovalPolicy::Trusted.approves(true));
        assert!(!ApprovalPolicy::Trusted.approves(false));
        assert!(!ApprovalPolicy::Manual.approves(true));
        assert_eq!(ApprovalPolicy::parse("auto-approve"), Some(ApprovalPolicy::Auto));
        assert_eq!(ApprovalPolicy::parse("sometimes"), None);
    }
}
