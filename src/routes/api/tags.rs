use rocket::serde::json::Json;
use rocket::{Route, State};
use serde::Deserialize;
use serde_json::Value;

use crate::db::DbPool;
use crate::error::{done, ok, parse_command, ApiError, ApiResult, FieldErrors};
use crate::models::tag::{normalize_names, Tag, MAX_TAG_LEN};
use crate::routes::api::posts::{require_post, visible_post};
use crate::security::auth::{AdminUser, AuthenticatedUser, Viewer};

/// Flags the first over-long name under `tags`. Shared with post create and update.
pub(crate) fn check_tag_names(errors: &mut FieldErrors, names: &[String]) {
    if let Some(long) = normalize_names(names)
        .iter()
        .find(|n| n.chars().count() > MAX_TAG_LEN)
    {
        errors.add(
            "tags",
            format!("Tag '{}' is longer than {} characters", long, MAX_TAG_LEN),
        );
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum TagCommand {
    Create { name: String },
    UpdateTags { post_id: i64, tags: Vec<String> },
}

#[get("/tags?<action>&<post_id>")]
pub fn get_tags(
    pool: &State<DbPool>,
    viewer: Viewer,
    action: Option<&str>,
    post_id: Option<i64>,
) -> ApiResult {
    match action.unwrap_or("all") {
        "all" => ok("Tags retrieved", Tag::list_with_counts(pool)?),
        "by_post" => {
            let post_id =
                post_id.ok_or_else(|| ApiError::field("post_id", "Post id is required"))?;
            visible_post(pool, post_id, viewer.user_id(), &viewer.capability)?;
            ok("Tags retrieved", Tag::for_post(pool, post_id)?)
        }
        other => Err(ApiError::BadRequest(format!("Unknown action '{}'", other))),
    }
}

#[post("/tags", format = "json", data = "<body>")]
pub fn post_tags(pool: &State<DbPool>, auth: AuthenticatedUser, body: Json<Value>) -> ApiResult {
    match parse_command::<TagCommand>(body.into_inner())? {
        TagCommand::Create { name } => {
            let name = name.trim();
            if name.is_empty() {
                return Err(ApiError::field("name", "Tag name is required"));
            }
            if name.chars().count() > MAX_TAG_LEN {
                return Err(ApiError::field(
                    "name",
                    format!("Tag name must be at most {} characters", MAX_TAG_LEN),
                ));
            }
            let id = Tag::find_or_create(pool, name)?;
            let tag = Tag::find_by_id(pool, id)?.ok_or(ApiError::NotFound("Tag"))?;
            ok("Tag saved", tag)
        }
        TagCommand::UpdateTags { post_id, tags } => {
            let post = require_post(pool, post_id)?;
            if !auth.can_edit(post.author_id) {
                return Err(ApiError::forbidden());
            }
            let mut errors = FieldErrors::new();
            check_tag_names(&mut errors, &tags);
            errors.into_result()?;
            ok("Tags updated", Tag::set_for_post(pool, post_id, &tags)?)
        }
    }
}

#[delete("/tags?<id>")]
pub fn delete_tag(pool: &State<DbPool>, admin: AdminUser, id: i64) -> ApiResult {
    if !Tag::delete(pool, id)? {
        return Err(ApiError::NotFound("Tag"));
    }
    log::info!("Tag {} deleted by {}", id, admin.user.username);
    done("Tag deleted")
}

pub fn routes() -> Vec<Route> {
    routes![get_tags, post_tags, delete_tag]
}
