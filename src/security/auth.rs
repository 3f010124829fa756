use chrono::{Duration, Utc};
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::request::{FromRequest, Outcome, Request};
use rocket::State;
use rusqlite::{params, OptionalExtension};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

use crate::db::DbPool;
use crate::error::ApiError;
use crate::models::settings::{trust_proxy_headers, MAX_SESSION_HOURS};
use crate::models::user::User;
use crate::security::role::Capability;

pub const SESSION_COOKIE: &str = "quill_session";
pub const MIN_USERNAME_LEN: usize = 3;
pub const MIN_PASSWORD_LEN: usize = 8;

// ── Client IP request guard ──

/// Client address. Proxy headers are only honoured when `trust_proxy_headers` is on.
pub struct ClientIp(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientIp {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let behind_proxy = match request.guard::<&State<DbPool>>().await.succeeded() {
            Some(pool) => trust_proxy_headers(pool),
            None => false,
        };
        if !behind_proxy {
            return Outcome::Success(ClientIp(peer_ip(request)));
        }

        let headers = request.headers();

        // X-Forwarded-For: client, proxy1, proxy2; the first entry is the client
        let forwarded = headers
            .get_one("X-Forwarded-For")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());
        if let Some(ip) = forwarded {
            return Outcome::Success(ClientIp(ip.to_string()));
        }

        if let Some(ip) = headers.get_one("X-Real-IP").map(str::trim).filter(|ip| !ip.is_empty()) {
            return Outcome::Success(ClientIp(ip.to_string()));
        }

        Outcome::Success(ClientIp(peer_ip(request)))
    }
}

fn peer_ip(request: &Request<'_>) -> String {
    request
        .remote()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

// ── Session resolution (once per request) ──

#[derive(Clone)]
struct SessionContext {
    user: User,
    capability: Capability,
    session_id: String,
}

async fn resolve_session(request: &Request<'_>) -> Option<SessionContext> {
    let pool = request.guard::<&State<DbPool>>().await.succeeded()?;
    let cookies = request.cookies();
    let session_id = cookies.get_private(SESSION_COOKIE)?.value().to_string();

    let user = match session_user(pool, &session_id) {
        Ok(Some(user)) => user,
        Ok(None) => {
            cookies.remove_private(Cookie::from(SESSION_COOKIE));
            return None;
        }
        Err(e) => {
            log::error!("Session lookup failed: {}", e);
            return None;
        }
    };

    match Capability::resolve(pool, user.id) {
        Ok(capability) => Some(SessionContext {
            user,
            capability,
            session_id,
        }),
        Err(e) => {
            log::error!("Role lookup failed for user {}: {}", user.id, e);
            None
        }
    }
}

async fn cached_session(request: &Request<'_>) -> Option<SessionContext> {
    request
        .local_cache_async(async { resolve_session(request).await })
        .await
        .clone()
}

// ── Guards ──

/// Whoever is making the request, logged in or not. Never fails.
pub struct Viewer {
    pub user: Option<User>,
    pub capability: Capability,
}

impl Viewer {
    pub fn user_id(&self) -> Option<i64> {
        self.user.as_ref().map(|u| u.id)
    }

    pub fn require_user(&self) -> Result<&User, ApiError> {
        self.user.as_ref().ok_or(ApiError::NotLoggedIn)
    }

    /// Owner of the resource, or any admin.
    pub fn can_edit(&self, owner_id: i64) -> bool {
        self.user_id()
            .map(|id| self.capability.can_edit(id, owner_id))
            .unwrap_or(false)
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Viewer {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let viewer = match cached_session(request).await {
            Some(ctx) => Viewer {
                user: Some(ctx.user),
                capability: ctx.capability,
            },
            None => Viewer {
                user: None,
                capability: Capability::guest(),
            },
        };
        Outcome::Success(viewer)
    }
}

/// Any active user with a valid session.
pub struct AuthenticatedUser {
    pub user: User,
    pub capability: Capability,
    pub session_id: String,
}

impl AuthenticatedUser {
    pub fn can_edit(&self, owner_id: i64) -> bool {
        self.capability.can_edit(self.user.id, owner_id)
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthenticatedUser {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match cached_session(request).await {
            Some(ctx) => Outcome::Success(AuthenticatedUser {
                user: ctx.user,
                capability: ctx.capability,
                session_id: ctx.session_id,
            }),
            None => Outcome::Forward(Status::Unauthorized),
        }
    }
}

/// Requires an admin capability row (any role).
pub struct AdminUser {
    pub user: User,
    pub capability: Capability,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminUser {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match cached_session(request).await {
            Some(ctx) if ctx.capability.is_admin => Outcome::Success(AdminUser {
                user: ctx.user,
                capability: ctx.capability,
            }),
            Some(_) => Outcome::Forward(Status::Forbidden),
            None => Outcome::Forward(Status::Unauthorized),
        }
    }
}

// ── Password utilities ──

/// Tests use the minimum cost; the default takes seconds per hash in debug builds.
fn hash_cost() -> u32 {
    if cfg!(test) {
        4
    } else {
        bcrypt::DEFAULT_COST
    }
}

pub fn generate_salt() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}

// Salt goes first so it survives bcrypt's 72-byte input limit.
fn salted(password: &str, salt: &str) -> String {
    format!("{}{}", salt, password)
}

pub fn hash_password(password: &str, salt: &str) -> Result<String, String> {
    bcrypt::hash(salted(password, salt), hash_cost()).map_err(|e| e.to_string())
}

pub fn verify_password(password: &str, salt: &str, hash: &str) -> bool {
    bcrypt::verify(salted(password, salt), hash).unwrap_or(false)
}

pub fn is_valid_email(email: &str) -> bool {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    let re = EMAIL_RE
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));
    email.len() <= 254 && re.is_match(email)
}

// ── Session management ──

pub fn create_session(pool: &DbPool, user: &User, expiry_hours: i64) -> Result<String, String> {
    let conn = pool.get().map_err(|e| e.to_string())?;

    let session_id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now().naive_utc();
    let expires = now + Duration::hours(expiry_hours.clamp(1, MAX_SESSION_HOURS));

    conn.execute(
        "INSERT INTO sessions (id, user_id, username, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![session_id, user.id, user.username, now, expires],
    )
    .map_err(|e| e.to_string())?;

    Ok(session_id)
}

/// The active user behind an unexpired session, if any.
pub fn session_user(pool: &DbPool, session_id: &str) -> Result<Option<User>, String> {
    let user_id: Option<i64> = {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let now = Utc::now().naive_utc();
        conn.query_row(
            "SELECT user_id FROM sessions WHERE id = ?1 AND expires_at > ?2",
            params![session_id, now],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| e.to_string())?
    };

    match user_id {
        Some(id) => Ok(User::get_by_id(pool, id)?.filter(|u| u.is_active)),
        None => Ok(None),
    }
}

pub fn destroy_session(pool: &DbPool, session_id: &str) -> Result<(), String> {
    let conn = pool.get().map_err(|e| e.to_string())?;
    conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])
        .map_err(|e| e.to_string())?;
    Ok(())
}

/// Sign the user out everywhere except `keep`. Returns how many sessions were dropped.
pub fn destroy_other_sessions(pool: &DbPool, user_id: i64, keep: &str) -> Result<usize, String> {
    let conn = pool.get().map_err(|e| e.to_string())?;
    conn.execute(
        "DELETE FROM sessions WHERE user_id = ?1 AND id <> ?2",
        params![user_id, keep],
    )
    .map_err(|e| e.to_string())
}

pub fn cleanup_expired_sessions(pool: &DbPool) -> Result<usize, String> {
    let conn = pool.get().map_err(|e| e.to_string())?;
    let now = Utc::now().naive_utc();
    conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])
        .map_err(|e| e.to_string())
}

/// Private (encrypted) cookie, HttpOnly and SameSite=Lax. `Secure` when the
/// site is served over https or marked as production.
pub fn set_session_cookie(cookies: &CookieJar<'_>, session_id: &str, secure: bool) {
    let mut cookie = Cookie::new(SESSION_COOKIE, session_id.to_string());
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_path("/");
    cookie.set_secure(secure);
    cookies.add_private(cookie);
}

pub fn current_session_id(cookies: &CookieJar<'_>) -> Option<String> {
    cookies
        .get_private(SESSION_COOKIE)
        .map(|c| c.value().to_string())
}

pub fn clear_session_cookie(cookies: &CookieJar<'_>) {
    cookies.remove_private(Cookie::from(SESSION_COOKIE));
}

pub fn hash_ip(ip: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ip.as_bytes());
    hex::encode(hasher.finalize())
}
