use std::collections::BTreeMap;

use serde::Serialize;

use crate::db::DbPool;
use crate::models::admin::Admin;
use crate::models::category::Category;
use crate::models::comment::Comment;
use crate::models::post::{Post, PostFilter};
use crate::models::tag::Tag;
use crate::models::user::User;

/// Read-only counts for the admin dashboard.
#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub users: i64,
    pub admins: i64,
    pub posts: i64,
    pub posts_by_status: BTreeMap<String, i64>,
    pub comments: i64,
    pub pending_comments: i64,
    pub categories: i64,
    pub tags: i64,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub stats: DashboardStats,
    pub recent_posts: Vec<Post>,
    pub recent_comments: Vec<Comment>,
    pub recent_users: Vec<User>,
}

impl Dashboard {
    pub fn load(pool: &DbPool, recent: i64) -> Result<Self, String> {
        let stats = DashboardStats {
            users: User::count(pool)?,
            admins: Admin::count(pool)?,
            posts: Post::count(pool, &PostFilter::default())?,
            posts_by_status: Post::count_by_status(pool)?,
            comments: Comment::count(pool, None)?,
            pending_comments: Comment::count(pool, Some(false))?,
            categories: Category::count(pool)?,
            tags: Tag::count(pool)?,
        };
        Ok(Dashboard {
            stats,
            recent_posts: Post::list(pool, &PostFilter::default(), recent, 0)?,
            recent_comments: Comment::list(pool, None, recent, 0)?,
            recent_users: User::recent(pool, recent)?,
        })
    }
}
