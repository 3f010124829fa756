use rocket::serde::json::Json;
use rocket::State;
use serde::Deserialize;
use serde_json::Value;

use crate::db::DbPool;
use crate::error::{ok, parse_command, ApiError, ApiResult};
use crate::models::comment::Comment;
use crate::security::auth::AdminUser;

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ModerationCommand {
    Approve { comment_id: i64 },
    Unapprove { comment_id: i64 },
}

#[post("/comments", format = "json", data = "<body>")]
pub fn moderate(pool: &State<DbPool>, admin: AdminUser, body: Json<Value>) -> ApiResult {
    if !admin.capability.can_moderate() {
        return Err(ApiError::forbidden());
    }
    let (comment_id, approved) = match parse_command::<ModerationCommand>(body.into_inner())? {
        ModerationCommand::Approve { comment_id } => (comment_id, true),
        ModerationCommand::Unapprove { comment_id } => (comment_id, false),
    };
    if !Comment::set_approved(pool, comment_id, approved)? {
        return Err(ApiError::NotFound("Comment"));
    }
    log::info!(
        "Comment {} {} by {}",
        comment_id,
        if approved { "approved" } else { "unapproved" },
        admin.user.username
    );
    let comment = Comment::find_by_id(pool, comment_id)?.ok_or(ApiError::NotFound("Comment"))?;
    ok(if approved { "Comment approved" } else { "Comment unapproved" }, comment)
}
