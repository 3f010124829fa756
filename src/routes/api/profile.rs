use rocket::serde::json::Json;
use rocket::{Route, State};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::db::DbPool;
use crate::error::{done, is_unique_violation, ok, parse_command, ApiError, ApiResult, FieldErrors};
use crate::models::user::User;
use crate::security::auth::{self, AuthenticatedUser, Viewer};

const MAX_BIO_LEN: usize = 1000;

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ProfileCommand {
    /// Absent fields keep their value; an empty string clears bio and picture.
    Update {
        email: Option<String>,
        bio: Option<String>,
        profile_picture: Option<String>,
    },
    ChangePassword {
        current_password: String,
        new_password: String,
        confirm_password: String,
    },
}

fn blank_to_none(value: Option<String>, current: Option<String>) -> Option<String> {
    match value {
        Some(v) => Some(v.trim().to_string()).filter(|v| !v.is_empty()),
        None => current,
    }
}

/// Own profile when `user_id` is absent, otherwise the public view of an active user.
#[get("/profile?<user_id>")]
pub fn get_profile(pool: &State<DbPool>, viewer: Viewer, user_id: Option<i64>) -> ApiResult {
    if let Some(id) = user_id {
        let user = User::get_by_id(pool, id)?
            .filter(|u| u.is_active)
            .ok_or(ApiError::NotFound("User"))?;
        let mut profile = user.public_json();
        profile["published_posts"] = json!(User::published_post_count(pool, id)?);
        return ok("Profile retrieved", profile);
    }

    let user = viewer.require_user()?;
    ok(
        "Profile retrieved",
        json!({
            "user": user,
            "role": viewer.capability.role,
            "is_admin": viewer.capability.is_admin,
        }),
    )
}

#[post("/profile", format = "json", data = "<body>")]
pub fn post_profile(pool: &State<DbPool>, auth: AuthenticatedUser, body: Json<Value>) -> ApiResult {
    match parse_command::<ProfileCommand>(body.into_inner())? {
        ProfileCommand::Update {
            email,
            bio,
            profile_picture,
        } => {
            let user = &auth.user;
            let email = email
                .map(|e| e.trim().to_string())
                .unwrap_or_else(|| user.email.clone());
            let bio = blank_to_none(bio, user.bio.clone());
            let picture = blank_to_none(profile_picture, user.profile_picture.clone());

            let mut errors = FieldErrors::new();
            if !auth::is_valid_email(&email) {
                errors.add("email", "Email address is not valid");
            } else if User::email_taken(pool, &email, Some(user.id))? {
                errors.add("email", "Email is already registered");
            }
            if bio.as_deref().map(|b| b.chars().count() > MAX_BIO_LEN).unwrap_or(false) {
                errors.add("bio", format!("Bio must be at most {} characters", MAX_BIO_LEN));
            }
            errors.into_result()?;

            User::update_profile(pool, user.id, &email, bio.as_deref(), picture.as_deref())
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        ApiError::Conflict("Email is already registered".to_string())
                    } else {
                        ApiError::Internal(e)
                    }
                })?;

            let updated = User::get_by_id(pool, user.id)?.ok_or(ApiError::NotFound("User"))?;
            ok("Profile updated", updated)
        }
        ProfileCommand::ChangePassword {
            current_password,
            new_password,
            confirm_password,
        } => {
            let user = &auth.user;
            let salt = User::salt_for(pool, user.id)?.unwrap_or_default();

            let mut errors = FieldErrors::new();
            if !auth::verify_password(&current_password, &salt, &user.password_hash) {
                errors.add("current_password", "Current password is incorrect");
            }
            if new_password.chars().count() < auth::MIN_PASSWORD_LEN {
                errors.add(
                    "new_password",
                    format!("Password must be at least {} characters", auth::MIN_PASSWORD_LEN),
                );
            }
            if new_password != confirm_password {
                errors.add("confirm_password", "Passwords do not match");
            }
            errors.into_result()?;

            let new_salt = auth::generate_salt();
            let hash = auth::hash_password(&new_password, &new_salt)?;
            User::update_password(pool, user.id, &hash, &new_salt)?;
            let dropped = auth::destroy_other_sessions(pool, user.id, &auth.session_id)?;
            log::info!(
                "User {} changed their password ({} other session(s) signed out)",
                user.username,
                dropped
            );
            done("Password changed")
        }
    }
}

pub fn routes() -> Vec<Route> {
    routes![get_profile, post_profile]
}
