use std::collections::HashMap;

use rocket::serde::json::Json;
use rocket::State;

use crate::db::{DbPool, DEFAULT_SETTINGS};
use crate::error::{ok, ApiError, ApiResult, FieldErrors};
use crate::models::comment::ApprovalPolicy;
use crate::models::settings::{
    Setting, MAX_LOGIN_ATTEMPTS, MAX_PAGE_SIZE, MAX_SESSION_HOURS, MAX_UPLOAD_MB,
};
use crate::security::auth::AdminUser;

/// Integer settings and their inclusive upper bound; the lower bound is always 1.
const NUMERIC_KEYS: &[(&str, i64)] = &[
    ("posts_per_page", MAX_PAGE_SIZE),
    ("recent_posts_limit", MAX_PAGE_SIZE),
    ("featured_posts_limit", MAX_PAGE_SIZE),
    ("session_expiry_hours", MAX_SESSION_HOURS),
    ("login_rate_limit", MAX_LOGIN_ATTEMPTS),
    ("uploads_max_mb", MAX_UPLOAD_MB),
];

const BOOLEAN_KEYS: &[&str] = &["trust_proxy_headers"];

fn is_known(key: &str) -> bool {
    DEFAULT_SETTINGS.iter().any(|(k, _)| *k == key)
}

fn check_value(errors: &mut FieldErrors, key: &str, value: &str) {
    if let Some(&(_, max)) = NUMERIC_KEYS.iter().find(|(k, _)| *k == key) {
        if !matches!(value.parse::<i64>(), Ok(n) if (1..=max).contains(&n)) {
            errors.add(key, format!("Must be a whole number between 1 and {}", max));
        }
        return;
    }
    if BOOLEAN_KEYS.contains(&key) {
        if value != "true" && value != "false" {
            errors.add(key, "Must be true or false");
        }
        return;
    }
    match key {
        "comments_moderation" if ApprovalPolicy::parse(value).is_none() => {
            errors.add(key, "Must be auto, trusted or manual");
        }
        "site_name" | "uploads_dir" if value.is_empty() => {
            errors.add(key, "Cannot be empty");
        }
        _ => {}
    }
}

// ── Settings ──

#[get("/settings")]
pub fn get_settings(pool: &State<DbPool>, admin: AdminUser) -> ApiResult {
    if !admin.capability.can_manage_users() {
        return Err(ApiError::forbidden());
    }
    let settings: HashMap<String, String> = Setting::all(pool)
        .into_iter()
        .filter(|(k, _)| is_known(k))
        .collect();
    ok("Settings retrieved", settings)
}

/// Saves every known key in the body; unknown keys or a bad value reject the whole request.
#[post("/settings", format = "json", data = "<body>")]
pub fn save_settings(
    pool: &State<DbPool>,
    admin: AdminUser,
    body: Json<HashMap<String, String>>,
) -> ApiResult {
    if !admin.capability.can_manage_users() {
        return Err(ApiError::forbidden());
    }
    let changes: Vec<(String, String)> = body
        .into_inner()
        .into_iter()
        .map(|(k, v)| (k, v.trim().to_string()))
        .collect();
    if changes.is_empty() {
        return Err(ApiError::BadRequest("No settings to save".to_string()));
    }

    let mut errors = FieldErrors::new();
    for (key, value) in &changes {
        if is_known(key) {
            check_value(&mut errors, key, value);
        } else {
            errors.add(key, "Unknown setting");
        }
    }
    errors.into_result()?;

    for (key, value) in &changes {
        Setting::set(pool, key, value)?;
    }
    log::info!(
        "Settings {:?} updated by {}",
        changes.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
        admin.user.username
    );
    ok("Settings saved", Setting::all(pool))
}
