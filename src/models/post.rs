use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Deserializer, Serialize};

use crate::db::DbPool;
use crate::models::tag::Tag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Published,
    Archived,
}

impl PostStatus {
    pub const ALL: [PostStatus; 3] = [PostStatus::Draft, PostStatus::Published, PostStatus::Archived];

    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
            PostStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(PostStatus::Draft),
            "published" => Some(PostStatus::Published),
            "archived" => Some(PostStatus::Archived),
            _ => None,
        }
    }

    /// Unknown statuses are stored as drafts rather than rejected.
    pub fn coerce(s: &str) -> Self {
        Self::parse(s).unwrap_or(PostStatus::Draft)
    }
}

impl ToSql for PostStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for PostStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        PostStatus::parse(s).ok_or_else(|| FromSqlError::Other(format!("bad post status: {}", s).into()))
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author_id: i64,
    pub author_username: String,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub featured_image: Option<String>,
    pub status: PostStatus,
    pub views_count: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PostForm {
    pub title: String,
    pub content: String,
    pub category_id: Option<i64>,
    pub featured_image: Option<String>,
    pub status: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Partial update. `None` leaves a column alone; for the nullable columns
/// `Some(None)` clears it.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct PostUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub category_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub featured_image: Option<Option<String>>,
    pub status: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl PostUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.category_id.is_none()
            && self.featured_image.is_none()
            && self.status.is_none()
            && self.tags.is_none()
    }
}

/// Present-but-null deserializes to `Some(None)`, absent stays `None` via `default`.
fn nullable<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostOrder {
    #[default]
    Newest,
    MostViewed,
}

#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub status: Option<PostStatus>,
    pub category_id: Option<i64>,
    pub author_id: Option<i64>,
    pub tag: Option<String>,
    pub search: Option<String>,
    pub featured_only: bool,
    pub order: PostOrder,
}

impl PostFilter {
    pub fn published() -> Self {
        PostFilter {
            status: Some(PostStatus::Published),
            ..Default::default()
        }
    }

    fn where_clause(&self) -> (String, Vec<Box<dyn ToSql>>) {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(status) = self.status {
            clauses.push("p.status = ?");
            values.push(Box::new(status));
        }
        if let Some(category_id) = self.category_id {
            clauses.push("p.category_id = ?");
            values.push(Box::new(category_id));
        }
        if let Some(author_id) = self.author_id {
            clauses.push("p.author_id = ?");
            values.push(Box::new(author_id));
        }
        if let Some(ref tag) = self.tag {
            clauses.push(
                "EXISTS (SELECT 1 FROM post_tags pt JOIN tags t ON t.id = pt.tag_id
                         WHERE pt.post_id = p.id AND t.name = ?)",
            );
            values.push(Box::new(tag.clone()));
        }
        if let Some(ref term) = self.search {
            let pattern = like_pattern(term);
            clauses.push("(p.title LIKE ? ESCAPE '\\' OR p.content LIKE ? ESCAPE '\\')");
            values.push(Box::new(pattern.clone()));
            values.push(Box::new(pattern));
        }
        if self.featured_only {
            clauses.push("p.featured_image IS NOT NULL AND p.featured_image <> ''");
        }

        let sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        (sql, values)
    }
}

/// `%term%` with LIKE wildcards in the user's term escaped.
pub fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for ch in term.trim().chars() {
        if matches!(ch, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

impl Post {
    const SELECT: &'static str = "SELECT p.id, p.title, p.content, p.author_id, u.username AS author_username,
                p.category_id, c.name AS category_name, p.featured_image, p.status,
                p.views_count, p.created_at, p.updated_at
         FROM blog_posts p
         JOIN users u ON u.id = p.author_id
         LEFT JOIN categories c ON c.id = p.category_id";

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Post {
            id: row.get("id")?,
            title: row.get("title")?,
            content: row.get("content")?,
            author_id: row.get("author_id")?,
            author_username: row.get("author_username")?,
            category_id: row.get("category_id")?,
            category_name: row.get("category_name")?,
            featured_image: row.get("featured_image")?,
            status: row.get("status")?,
            views_count: row.get("views_count")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn find_by_id(pool: &DbPool, id: i64) -> Result<Option<Self>, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.query_row(
            &format!("{} WHERE p.id = ?1", Self::SELECT),
            params![id],
            Self::from_row,
        )
        .optional()
        .map_err(|e| e.to_string())
    }

    pub fn list(pool: &DbPool, filter: &PostFilter, limit: i64, offset: i64) -> Result<Vec<Self>, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;

        let (where_sql, mut values) = filter.where_clause();
        let order = match filter.order {
            PostOrder::Newest => "p.created_at DESC, p.id DESC",
            PostOrder::MostViewed => "p.views_count DESC, p.id DESC",
        };
        let sql = format!("{}{} ORDER BY {} LIMIT ? OFFSET ?", Self::SELECT, where_sql, order);
        values.push(Box::new(limit));
        values.push(Box::new(offset));

        let mut stmt = conn.prepare(&sql).map_err(|e| e.to_string())?;
        let params_refs: Vec<&dyn ToSql> = values.iter().map(|p| p.as_ref()).collect();
        let rows = stmt
            .query_map(params_refs.as_slice(), Self::from_row)
            .map_err(|e| e.to_string())?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| e.to_string())
    }

    pub fn count(pool: &DbPool, filter: &PostFilter) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let (where_sql, values) = filter.where_clause();
        let sql = format!("SELECT COUNT(*) FROM blog_posts p{}", where_sql);
        let params_refs: Vec<&dyn ToSql> = values.iter().map(|p| p.as_ref()).collect();
        conn.query_row(&sql, params_refs.as_slice(), |row| row.get(0))
            .map_err(|e| e.to_string())
    }

    pub fn count_by_status(pool: &DbPool) -> Result<BTreeMap<String, i64>, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let mut counts: BTreeMap<String, i64> = PostStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        let mut stmt = conn
            .prepare("SELECT status, COUNT(*) FROM blog_posts GROUP BY status")
            .map_err(|e| e.to_string())?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(|e| e.to_string())?;
        for row in rows {
            let (status, n) = row.map_err(|e| e.to_string())?;
            counts.insert(status, n);
        }
        Ok(counts)
    }

    /// Inserts the post and, when `form.tags` is present, its tags in one transaction.
    pub fn create(pool: &DbPool, author_id: i64, form: &PostForm) -> Result<i64, String> {
        let mut conn = pool.get().map_err(|e| e.to_string())?;
        let status = form
            .status
            .as_deref()
            .map(PostStatus::coerce)
            .unwrap_or(PostStatus::Draft);

        let tx = conn.transaction().map_err(|e| e.to_string())?;
        tx.execute(
            "INSERT INTO blog_posts (title, content, author_id, category_id, featured_image, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                form.title.trim(),
                form.content,
                author_id,
                form.category_id,
                form.featured_image,
                status,
            ],
        )
        .map_err(|e| e.to_string())?;
        let id = tx.last_insert_rowid();

        if let Some(ref tags) = form.tags {
            Tag::set_for_post_on(&tx, id, tags).map_err(|e| e.to_string())?;
        }
        tx.commit().map_err(|e| e.to_string())?;
        Ok(id)
    }

    /// Apply only the fields present in `changes`. Column changes and the tag set
    /// are written together or not at all.
    pub fn update(pool: &DbPool, id: i64, changes: &PostUpdate) -> Result<(), String> {
        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(ref title) = changes.title {
            sets.push("title = ?");
            values.push(Box::new(title.trim().to_string()));
        }
        if let Some(ref content) = changes.content {
            sets.push("content = ?");
            values.push(Box::new(content.clone()));
        }
        if let Some(category_id) = changes.category_id {
            sets.push("category_id = ?");
            values.push(Box::new(category_id));
        }
        if let Some(ref featured_image) = changes.featured_image {
            sets.push("featured_image = ?");
            values.push(Box::new(featured_image.clone()));
        }
        if let Some(ref status) = changes.status {
            sets.push("status = ?");
            values.push(Box::new(PostStatus::coerce(status)));
        }
        if sets.is_empty() && changes.tags.is_none() {
            return Ok(());
        }

        let mut conn = pool.get().map_err(|e| e.to_string())?;
        let tx = conn.transaction().map_err(|e| e.to_string())?;
        if !sets.is_empty() {
            let sql = format!(
                "UPDATE blog_posts SET {}, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
                sets.join(", ")
            );
            values.push(Box::new(id));
            let params_refs: Vec<&dyn ToSql> = values.iter().map(|p| p.as_ref()).collect();
            tx.execute(&sql, params_refs.as_slice())
                .map_err(|e| e.to_string())?;
        }
        if let Some(ref tags) = changes.tags {
            Tag::set_for_post_on(&tx, id, tags).map_err(|e| e.to_string())?;
        }
        tx.commit().map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn set_status(pool: &DbPool, id: i64, status: PostStatus) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE blog_posts SET status = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
            params![status, id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Single-statement increment, safe under concurrent readers.
    pub fn increment_views(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE blog_posts SET views_count = views_count + 1 WHERE id = ?1",
            params![id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Comments, tag links and reactions cascade.
    pub fn delete(pool: &DbPool, id: i64) -> Result<bool, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let n = conn
            .execute("DELETE FROM blog_posts WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        Ok(n > 0)
    }

    /// First paragraph-ish slice of the body for listings.
    pub fn excerpt(&self, max_chars: usize) -> String {
        let text = self.content.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.chars().count() <= max_chars {
            text
        } else {
            let cut: String = text.chars().take(max_chars).collect();
            format!("{}…", cut.trim_end())
        }
    }
}
