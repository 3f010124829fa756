use rocket::serde::json::Json;
use rocket::State;
use serde::Deserialize;
use serde_json::json;

use crate::db::DbPool;
use crate::error::{is_unique_violation, ok, ApiError, ApiResult, FieldErrors};
use crate::models::user::User;
use crate::security::auth;

const MAX_USERNAME_LEN: usize = 50;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Creates an account. Does not log the new user in.
#[post("/register", format = "json", data = "<form>")]
pub fn register(form: Json<RegisterRequest>, pool: &State<DbPool>) -> ApiResult {
    let username = form.username.trim();
    let email = form.email.trim();

    let mut errors = FieldErrors::new();
    let username_len = username.chars().count();
    if username_len < auth::MIN_USERNAME_LEN {
        errors.add(
            "username",
            format!("Username must be at least {} characters", auth::MIN_USERNAME_LEN),
        );
    } else if username_len > MAX_USERNAME_LEN {
        errors.add(
            "username",
            format!("Username must be at most {} characters", MAX_USERNAME_LEN),
        );
    }
    if !auth::is_valid_email(email) {
        errors.add("email", "Email address is not valid");
    }
    if form.password.chars().count() < auth::MIN_PASSWORD_LEN {
        errors.add(
            "password",
            format!("Password must be at least {} characters", auth::MIN_PASSWORD_LEN),
        );
    }
    if form.password != form.confirm_password {
        errors.add("confirm_password", "Passwords do not match");
    }
    if !errors.has("username") && User::username_taken(pool, username)? {
        errors.add("username", "Username is already taken");
    }
    if !errors.has("email") && User::email_taken(pool, email, None)? {
        errors.add("email", "Email is already registered");
    }
    errors.into_result()?;

    let salt = auth::generate_salt();
    let hash = auth::hash_password(&form.password, &salt)?;
    let id = User::create(pool, username, email, &hash, &salt).map_err(|e| {
        // Lost a race with a concurrent registration
        if is_unique_violation(&e) {
            ApiError::Conflict("Username or email is already registered".to_string())
        } else {
            ApiError::Internal(e)
        }
    })?;

    log::info!("Registered user '{}' (id {})", username, id);
    ok(
        "Registration successful. Please log in.",
        json!({ "id": id, "username": username }),
    )
}
