use rocket::serde::json::Json;
use rocket::State;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::db::DbPool;
use crate::error::{done, ok, parse_command, ApiError, ApiResult};
use crate::models::admin::Admin;
use crate::models::user::User;
use crate::routes::api::paging;
use crate::security::auth::AdminUser;
use crate::security::role::{Capability, Role};

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum UserCommand {
    ToggleActive { user_id: i64 },
    Delete { user_id: i64 },
    /// `role` absent, empty or "none" removes the admin row.
    SetRole { user_id: i64, role: Option<String> },
}

// ── Users Management ──

#[get("/users?<limit>&<offset>")]
pub fn list_users(
    pool: &State<DbPool>,
    _admin: AdminUser,
    limit: Option<i64>,
    offset: Option<i64>,
) -> ApiResult {
    let (limit, offset) = paging(limit, offset, 50);
    let users = User::list_with_roles(pool, limit, offset)?;
    let total = User::count(pool)?;
    ok(
        "Users retrieved",
        json!({ "users": users, "total": total, "limit": limit, "offset": offset }),
    )
}

/// Loads the target and refuses self-targeting and acting on a higher role.
fn target(pool: &DbPool, admin: &AdminUser, user_id: i64, verb: &str) -> Result<User, ApiError> {
    if user_id == admin.user.id {
        return Err(ApiError::BadRequest(format!("You cannot {} your own account", verb)));
    }
    let user = User::get_by_id(pool, user_id)?.ok_or(ApiError::NotFound("User"))?;
    let their_role = Capability::resolve(pool, user.id)?.role;
    if their_role > admin.capability.role {
        return Err(ApiError::forbidden());
    }
    Ok(user)
}

#[post("/users", format = "json", data = "<body>")]
pub fn manage_user(pool: &State<DbPool>, admin: AdminUser, body: Json<Value>) -> ApiResult {
    match parse_command::<UserCommand>(body.into_inner())? {
        UserCommand::ToggleActive { user_id } => {
            if !admin.capability.can_manage_users() {
                return Err(ApiError::forbidden());
            }
            let user = target(pool, &admin, user_id, "deactivate")?;
            let active = !user.is_active;
            User::set_active(pool, user.id, active)?;
            log::info!(
                "User '{}' {} by {}",
                user.username,
                if active { "activated" } else { "deactivated" },
                admin.user.username
            );
            ok(
                if active { "User activated" } else { "User deactivated" },
                json!({ "user_id": user.id, "is_active": active }),
            )
        }
        UserCommand::Delete { user_id } => {
            if !admin.capability.can_manage_users() {
                return Err(ApiError::forbidden());
            }
            let user = target(pool, &admin, user_id, "delete")?;
            if !User::delete(pool, user.id)? {
                return Err(ApiError::NotFound("User"));
            }
            log::info!("User '{}' deleted by {}", user.username, admin.user.username);
            done("User deleted")
        }
        UserCommand::SetRole { user_id, role } => {
            if !admin.capability.can_assign_roles() {
                return Err(ApiError::forbidden());
            }
            let user = target(pool, &admin, user_id, "change the role of")?;
            let requested = role.as_deref().map(str::trim).unwrap_or("");
            if requested.is_empty() || requested == "none" {
                Admin::revoke(pool, user.id)?;
                log::info!("Admin role removed from '{}' by {}", user.username, admin.user.username);
                return ok("Role removed", json!({ "user_id": user.id, "role": Value::Null }));
            }
            let role = Role::parse_assignable(requested)
                .and_then(|r| r.as_db_str())
                .ok_or_else(|| {
                    ApiError::field("role", "Role must be editor, admin or superadmin")
                })?;
            Admin::assign(pool, user.id, role)?;
            log::info!("User '{}' is now {} (set by {})", user.username, role, admin.user.username);
            ok("Role updated", json!({ "user_id": user.id, "role": role }))
        }
    }
}
