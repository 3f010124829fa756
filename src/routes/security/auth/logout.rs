use rocket::http::CookieJar;
use rocket::State;

use crate::db::DbPool;
use crate::error::{done, ApiResult};
use crate::security::auth;

/// Always succeeds, with or without a live session.
#[post("/logout")]
pub fn logout(pool: &State<DbPool>, cookies: &CookieJar<'_>) -> ApiResult {
    if let Some(session_id) = auth::current_session_id(cookies) {
        auth::destroy_session(pool, &session_id)?;
    }
    auth::clear_session_cookie(cookies);
    done("Logged out")
}
