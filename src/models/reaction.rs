use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::db::DbPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Dislike,
}

impl ReactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionKind::Like => "like",
            ReactionKind::Dislike => "dislike",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "like" => Some(ReactionKind::Like),
            "dislike" => Some(ReactionKind::Dislike),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ReactionSummary {
    pub likes: i64,
    pub dislikes: i64,
    pub mine: Option<ReactionKind>,
}

pub struct Reaction;

impl Reaction {
    /// One reaction per (post, user); a second call replaces the first.
    pub fn upsert(pool: &DbPool, post_id: i64, user_id: i64, kind: ReactionKind) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO reactions (post_id, user_id, reaction) VALUES (?1, ?2, ?3)
             ON CONFLICT(post_id, user_id)
             DO UPDATE SET reaction = excluded.reaction, created_at = CURRENT_TIMESTAMP",
            params![post_id, user_id, kind.as_str()],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn remove(pool: &DbPool, post_id: i64, user_id: i64) -> Result<bool, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let n = conn
            .execute(
                "DELETE FROM reactions WHERE post_id = ?1 AND user_id = ?2",
                params![post_id, user_id],
            )
            .map_err(|e| e.to_string())?;
        Ok(n > 0)
    }

    pub fn summary(pool: &DbPool, post_id: i64, user_id: Option<i64>) -> Result<ReactionSummary, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let (likes, dislikes): (i64, i64) = conn
            .query_row(
                "SELECT COALESCE(SUM(reaction = 'like'), 0), COALESCE(SUM(reaction = 'dislike'), 0)
                 FROM reactions WHERE post_id = ?1",
                params![post_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| e.to_string())?;

        let mine = match user_id {
            Some(uid) => conn
                .query_row(
                    "SELECT reaction FROM reactions WHERE post_id = ?1 AND user_id = ?2",
                    params![post_id, uid],
                    |row| row.get::<_, String>(0),
                )
                .optional()
                .map_err(|e| e.to_string())?
                .and_then(|s| ReactionKind::parse(&s)),
            None => None,
        };

        Ok(ReactionSummary { likes, dislikes, mine })
    }
}
