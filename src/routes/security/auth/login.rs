use std::time::Duration;

use rocket::http::CookieJar;
use rocket::serde::json::Json;
use rocket::State;
use serde::Deserialize;
use serde_json::json;

use crate::db::DbPool;
use crate::error::{ok, ApiError, ApiResult, FieldErrors};
use crate::models::settings::SiteConfig;
use crate::models::user::User;
use crate::rate_limit::RateLimiter;
use crate::security::auth::{self, ClientIp};
use crate::security::role::Capability;

const LOGIN_WINDOW: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[post("/login", format = "json", data = "<form>")]
pub fn login(
    form: Json<LoginRequest>,
    pool: &State<DbPool>,
    limiter: &State<RateLimiter>,
    cookies: &CookieJar<'_>,
    client_ip: ClientIp,
) -> ApiResult {
    let config = SiteConfig::load(pool);
    let rate_key = format!("login:{}", auth::hash_ip(&client_ip.0));

    // Check rate limit before touching credentials
    if !limiter.check_and_record(&rate_key, config.login_rate_limit, LOGIN_WINDOW) {
        log::warn!("Login rate limit hit for {}", client_ip.0);
        return Err(ApiError::TooManyRequests(
            "Too many login attempts. Try again in 15 minutes.".to_string(),
        ));
    }

    let username = form.username.trim();
    let mut errors = FieldErrors::new();
    if username.is_empty() {
        errors.add("username", "Username is required");
    }
    if form.password.is_empty() {
        errors.add("password", "Password is required");
    }
    errors.into_result()?;

    let user = match User::get_by_username(pool, username)? {
        Some(u) => u,
        None => {
            log::info!("Login failed: unknown user '{}'", username);
            return Err(ApiError::InvalidCredentials);
        }
    };

    let salt = match User::salt_for(pool, user.id)? {
        Some(s) => s,
        None => {
            log::warn!("Login failed: no salt on record for '{}'", username);
            return Err(ApiError::InvalidCredentials);
        }
    };
    if !auth::verify_password(&form.password, &salt, &user.password_hash) {
        log::info!("Login failed: wrong password for '{}'", username);
        return Err(ApiError::InvalidCredentials);
    }

    if !user.is_active {
        log::info!("Login refused: account '{}' is disabled", username);
        return Err(ApiError::Forbidden("This account has been disabled".to_string()));
    }

    // One session per login: drop whatever this browser was carrying
    if let Some(previous) = auth::current_session_id(cookies) {
        auth::destroy_session(pool, &previous)?;
    }

    let session_id = auth::create_session(pool, &user, config.session_expiry_hours)?;
    auth::set_session_cookie(cookies, &session_id, config.secure_cookies);
    limiter.reset(&rate_key);

    let capability = Capability::resolve(pool, user.id)?;
    log::info!("User '{}' logged in", user.username);
    ok(
        "Login successful",
        json!({
            "user": user,
            "role": capability.role,
            "is_admin": capability.is_admin,
        }),
    )
}
