use rusqlite::params;
use std::collections::HashMap;

use crate::db::DbPool;
use crate::models::comment::ApprovalPolicy;

pub struct Setting;

impl Setting {
    pub fn get(pool: &DbPool, key: &str) -> Option<String> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .ok()
    }

    pub fn get_or(pool: &DbPool, key: &str, default: &str) -> String {
        Self::get(pool, key).unwrap_or_else(|| default.to_string())
    }

    pub fn get_i64_or(pool: &DbPool, key: &str, default: i64) -> i64 {
        Self::get(pool, key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    pub fn set(pool: &DbPool, key: &str, value: &str) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = ?2",
            params![key, value],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn all(pool: &DbPool) -> HashMap<String, String> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return HashMap::new(),
        };
        let mut stmt = match conn.prepare("SELECT key, value FROM settings") {
            Ok(s) => s,
            Err(_) => return HashMap::new(),
        };
        stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            ))
        })
        .map(|rows| rows.filter_map(|r| r.ok()).collect())
        .unwrap_or_default()
    }
}

pub const MAX_PAGE_SIZE: i64 = 100;
/// One year.
pub const MAX_SESSION_HOURS: i64 = 8760;
pub const MAX_LOGIN_ATTEMPTS: i64 = 1000;
pub const MAX_UPLOAD_MB: i64 = 1024;

/// Whether `X-Forwarded-For` / `X-Real-IP` name the client. Only true behind a proxy.
pub fn trust_proxy_headers(pool: &DbPool) -> bool {
    Setting::get_or(pool, "trust_proxy_headers", "false") == "true"
}

/// Typed view over the settings table, read once per request where needed.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub site_name: String,
    pub secure_cookies: bool,
    pub posts_per_page: i64,
    pub recent_posts_limit: i64,
    pub featured_posts_limit: i64,
    pub comment_policy: ApprovalPolicy,
    pub session_expiry_hours: i64,
    pub login_rate_limit: u64,
    pub trust_proxy_headers: bool,
    pub uploads_dir: String,
    pub uploads_max_bytes: u64,
}

impl SiteConfig {
    pub fn load(pool: &DbPool) -> Self {
        let site_url = Setting::get_or(pool, "site_url", "");
        let environment = Setting::get_or(pool, "site_environment", "development");
        let moderation = Setting::get_or(pool, "comments_moderation", "auto");
        let comment_policy = ApprovalPolicy::parse(&moderation).unwrap_or_else(|| {
            log::warn!(
                "Unknown comments_moderation value '{}', falling back to auto",
                moderation
            );
            ApprovalPolicy::Auto
        });

        SiteConfig {
            site_name: Setting::get_or(pool, "site_name", "Quill"),
            secure_cookies: site_url.starts_with("https://") || environment == "production",
            posts_per_page: Setting::get_i64_or(pool, "posts_per_page", 10)
                .clamp(1, MAX_PAGE_SIZE),
            recent_posts_limit: Setting::get_i64_or(pool, "recent_posts_limit", 5)
                .clamp(1, MAX_PAGE_SIZE),
            featured_posts_limit: Setting::get_i64_or(pool, "featured_posts_limit", 3)
                .clamp(1, MAX_PAGE_SIZE),
            comment_policy,
            session_expiry_hours: Setting::get_i64_or(pool, "session_expiry_hours", 24)
                .clamp(1, MAX_SESSION_HOURS),
            login_rate_limit: Setting::get_i64_or(pool, "login_rate_limit", 5)
                .clamp(1, MAX_LOGIN_ATTEMPTS) as u64,
            trust_proxy_headers: trust_proxy_headers(pool),
            uploads_dir: Setting::get_or(pool, "uploads_dir", "website/uploads"),
            uploads_max_bytes: (Setting::get_i64_or(pool, "uploads_max_mb", 5)
                .clamp(1, MAX_UPLOAD_MB) as u64)
                .saturating_mul(1024 * 1024),
        }
    }
}
