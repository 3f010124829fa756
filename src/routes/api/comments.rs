use rocket::serde::json::Json;
use rocket::{Route, State};
use serde::Deserialize;
use serde_json::json;

use crate::db::DbPool;
use crate::error::{done, ok, ApiError, ApiResult};
use crate::models::comment::{Comment, CommentForm};
use crate::models::settings::SiteConfig;
use crate::routes::api::paging;
use crate::routes::api::posts::visible_post;
use crate::security::auth::{AuthenticatedUser, Viewer};

const MAX_COMMENT_LEN: usize = 5000;

#[derive(Debug, FromForm)]
pub struct CommentQuery {
    pub action: Option<String>,
    pub id: Option<i64>,
    pub post_id: Option<i64>,
    pub approved: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CommentEdit {
    pub id: i64,
    pub content: String,
}

fn require_comment(pool: &DbPool, id: i64) -> Result<Comment, ApiError> {
    Comment::find_by_id(pool, id)?.ok_or(ApiError::NotFound("Comment"))
}

fn validate_content(content: &str) -> Result<(), ApiError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ApiError::field("content", "Comment cannot be empty"));
    }
    if content.chars().count() > MAX_COMMENT_LEN {
        return Err(ApiError::field(
            "content",
            format!("Comment must be at most {} characters", MAX_COMMENT_LEN),
        ));
    }
    Ok(())
}

// ── GET /api/comments ──

#[get("/comments?<query..>")]
pub fn get_comments(pool: &State<DbPool>, viewer: Viewer, query: CommentQuery) -> ApiResult {
    match query.action.as_deref().unwrap_or("by_post") {
        "by_post" => {
            let post_id = query
                .post_id
                .ok_or_else(|| ApiError::field("post_id", "Post id is required"))?;
            visible_post(pool, post_id, viewer.user_id(), &viewer.capability)?;
            let threads =
                Comment::threads_for_post(pool, post_id, viewer.capability.can_moderate())?;
            ok("Comments retrieved", threads)
        }
        "all" => {
            viewer.require_user()?;
            if !viewer.capability.can_moderate() {
                return Err(ApiError::forbidden());
            }
            let (limit, offset) = paging(query.limit, query.offset, 50);
            let comments = Comment::list(pool, query.approved, limit, offset)?;
            let total = Comment::count(pool, query.approved)?;
            ok(
                "Comments retrieved",
                json!({ "comments": comments, "total": total, "limit": limit, "offset": offset }),
            )
        }
        "single" => {
            let id = query.id.ok_or_else(|| ApiError::field("id", "Comment id is required"))?;
            let comment = require_comment(pool, id)?;
            if !comment.is_approved && !viewer.capability.can_moderate() {
                return Err(ApiError::NotFound("Comment"));
            }
            // Comments on a post the viewer cannot see do not exist for them either
            visible_post(pool, comment.post_id, viewer.user_id(), &viewer.capability)
                .map_err(|_| ApiError::NotFound("Comment"))?;
            ok("Comment retrieved", comment)
        }
        other => Err(ApiError::BadRequest(format!("Unknown action '{}'", other))),
    }
}

// ── POST /api/comments ──

#[post("/comments", format = "json", data = "<form>")]
pub fn create_comment(
    pool: &State<DbPool>,
    auth: AuthenticatedUser,
    form: Json<CommentForm>,
) -> ApiResult {
    let mut form = form.into_inner();
    validate_content(&form.content)?;
    visible_post(pool, form.post_id, Some(auth.user.id), &auth.capability)?;

    if let Some(parent_id) = form.parent_comment_id {
        let parent = match Comment::find_by_id(pool, parent_id)? {
            Some(p) if p.post_id == form.post_id => p,
            _ => {
                return Err(ApiError::field(
                    "parent_comment_id",
                    "Parent comment does not belong to this post",
                ))
            }
        };
        // Threads are one level deep: a reply to a reply joins the top-level thread.
        form.parent_comment_id = Some(parent.parent_comment_id.unwrap_or(parent.id));
    }

    let config = SiteConfig::load(pool);
    let approved = config.comment_policy.approves(auth.capability.is_admin);
    let id = Comment::create(pool, auth.user.id, &form, approved)?;
    let comment = require_comment(pool, id)?;

    let message = if approved {
        "Comment posted"
    } else {
        "Comment submitted for moderation"
    };
    ok(message, comment)
}

// ── PUT /api/comments ──

#[put("/comments", format = "json", data = "<edit>")]
pub fn update_comment(
    pool: &State<DbPool>,
    auth: AuthenticatedUser,
    edit: Json<CommentEdit>,
) -> ApiResult {
    let comment = require_comment(pool, edit.id)?;
    if !auth.can_edit(comment.user_id) {
        return Err(ApiError::forbidden());
    }
    validate_content(&edit.content)?;
    Comment::update_content(pool, comment.id, &edit.content)?;
    ok("Comment updated", require_comment(pool, comment.id)?)
}

// ── DELETE /api/comments?id= ──

#[delete("/comments?<id>")]
pub fn delete_comment(pool: &State<DbPool>, auth: AuthenticatedUser, id: i64) -> ApiResult {
    let comment = require_comment(pool, id)?;
    if !auth.can_edit(comment.user_id) {
        return Err(ApiError::forbidden());
    }
    Comment::delete(pool, id)?;
    done("Comment deleted")
}

pub fn routes() -> Vec<Route> {
    routes![get_comments, create_comment, update_comment, delete_comment]
}
