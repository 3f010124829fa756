use rocket::serde::json::Json;
use rocket::{Route, State};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::db::DbPool;
use crate::error::{done, ok, parse_command, ApiError, ApiResult, FieldErrors};
use crate::models::category::Category;
use crate::models::post::{Post, PostFilter, PostForm, PostOrder, PostStatus, PostUpdate};
use crate::models::reaction::Reaction;
use crate::models::settings::SiteConfig;
use crate::models::tag::Tag;
use crate::routes::api::paging;
use crate::routes::api::tags::check_tag_names;
use crate::security::auth::{AuthenticatedUser, Viewer};
use crate::security::role::Capability;

const MAX_TITLE_LEN: usize = 200;

#[derive(Debug, FromForm, Default)]
pub struct PostQuery {
    pub action: Option<String>,
    pub id: Option<i64>,
    pub status: Option<String>,
    pub category_id: Option<i64>,
    pub author_id: Option<i64>,
    pub tag: Option<String>,
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum PostCommand {
    Create(PostForm),
    Update {
        id: i64,
        #[serde(flatten)]
        changes: PostUpdate,
    },
    Delete {
        id: i64,
    },
    SetStatus {
        id: i64,
        status: String,
    },
}

// ── Shared helpers ──

pub(crate) fn require_post(pool: &DbPool, id: i64) -> Result<Post, ApiError> {
    Post::find_by_id(pool, id)?.ok_or(ApiError::NotFound("Post"))
}

/// Published posts are public; anything else only for its author or an admin.
pub(crate) fn can_view(post: &Post, viewer_id: Option<i64>, capability: &Capability) -> bool {
    post.status == PostStatus::Published
        || viewer_id
            .map(|id| capability.can_edit(id, post.author_id))
            .unwrap_or(false)
}

/// A post the viewer may see, or not-found so hidden drafts do not leak.
pub(crate) fn visible_post(
    pool: &DbPool,
    id: i64,
    viewer_id: Option<i64>,
    capability: &Capability,
) -> Result<Post, ApiError> {
    let post = require_post(pool, id)?;
    if can_view(&post, viewer_id, capability) {
        Ok(post)
    } else {
        Err(ApiError::NotFound("Post"))
    }
}

fn listing(pool: &DbPool, filter: &PostFilter, limit: i64, offset: i64) -> ApiResult {
    let posts = Post::list(pool, filter, limit, offset)?;
    let total = Post::count(pool, filter)?;
    ok(
        "Posts retrieved",
        json!({ "posts": posts, "total": total, "limit": limit, "offset": offset }),
    )
}

pub(crate) fn search_posts(pool: &DbPool, term: Option<&str>, limit: i64, offset: i64) -> ApiResult {
    let term = term.map(str::trim).unwrap_or_default();
    if term.is_empty() {
        return Err(ApiError::field("q", "Search term is required"));
    }
    let filter = PostFilter {
        search: Some(term.to_string()),
        ..PostFilter::published()
    };
    listing(pool, &filter, limit, offset)
}

fn with_details(pool: &DbPool, post: Post, viewer_id: Option<i64>) -> Result<Value, ApiError> {
    let tags = Tag::for_post(pool, post.id)?;
    let reactions = Reaction::summary(pool, post.id, viewer_id)?;
    Ok(json!({ "post": post, "tags": tags, "reactions": reactions }))
}

fn validate_title(errors: &mut FieldErrors, title: &str) {
    let title = title.trim();
    if title.is_empty() {
        errors.add("title", "Title is required");
    } else if title.chars().count() > MAX_TITLE_LEN {
        errors.add("title", format!("Title must be at most {} characters", MAX_TITLE_LEN));
    }
}

fn validate_content(errors: &mut FieldErrors, content: &str) {
    if content.trim().is_empty() {
        errors.add("content", "Content is required");
    }
}

fn validate_category(pool: &DbPool, errors: &mut FieldErrors, category_id: Option<i64>) -> Result<(), ApiError> {
    if let Some(id) = category_id {
        if !Category::exists(pool, id)? {
            errors.add("category_id", "Category does not exist");
        }
    }
    Ok(())
}

// ── GET /api/posts ──

#[get("/posts?<query..>")]
pub fn get_posts(pool: &State<DbPool>, viewer: Viewer, query: PostQuery) -> ApiResult {
    let config = SiteConfig::load(pool);
    let action = query.action.as_deref().unwrap_or("all");

    match action {
        "all" => {
            let (limit, offset) = paging(query.limit, query.offset, config.posts_per_page);
            let requested = match query.status.as_deref() {
                Some(s) => Some(
                    PostStatus::parse(s).ok_or_else(|| ApiError::field("status", "Unknown status"))?,
                ),
                None => None,
            };
            let own_listing = viewer.user_id().is_some() && query.author_id == viewer.user_id();

            let status = if viewer.capability.is_admin || own_listing {
                requested
            } else {
                match requested {
                    None | Some(PostStatus::Published) => Some(PostStatus::Published),
                    // Anonymous and non-admin viewers never see unpublished posts.
                    Some(_) => {
                        return ok(
                            "Posts retrieved",
                            json!({ "posts": [], "total": 0, "limit": limit, "offset": offset }),
                        )
                    }
                }
            };

            let filter = PostFilter {
                status,
                category_id: query.category_id,
                author_id: query.author_id,
                tag: query.tag.clone(),
                search: query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()).map(String::from),
                ..Default::default()
            };
            listing(pool, &filter, limit, offset)
        }
        "featured" => {
            let (limit, offset) = paging(query.limit, query.offset, config.featured_posts_limit);
            let filter = PostFilter {
                featured_only: true,
                order: PostOrder::MostViewed,
                ..PostFilter::published()
            };
            listing(pool, &filter, limit, offset)
        }
        "recent" => {
            let (limit, offset) = paging(query.limit, query.offset, config.recent_posts_limit);
            listing(pool, &PostFilter::published(), limit, offset)
        }
        "single" => {
            let id = query.id.ok_or_else(|| ApiError::field("id", "Post id is required"))?;
            let mut post = visible_post(pool, id, viewer.user_id(), &viewer.capability)?;
            if post.status == PostStatus::Published {
                Post::increment_views(pool, post.id)?;
                post.views_count += 1;
            }
            ok("Post retrieved", with_details(pool, post, viewer.user_id())?)
        }
        "by_category" => {
            let id = query
                .category_id
                .or(query.id)
                .ok_or_else(|| ApiError::field("category_id", "Category id is required"))?;
            if !Category::exists(pool, id)? {
                return Err(ApiError::NotFound("Category"));
            }
            let (limit, offset) = paging(query.limit, query.offset, config.posts_per_page);
            let filter = PostFilter {
                category_id: Some(id),
                ..PostFilter::published()
            };
            listing(pool, &filter, limit, offset)
        }
        "by_author" => {
            let id = query
                .author_id
                .or(query.id)
                .ok_or_else(|| ApiError::field("author_id", "Author id is required"))?;
            let (limit, offset) = paging(query.limit, query.offset, config.posts_per_page);
            let filter = PostFilter {
                author_id: Some(id),
                ..PostFilter::published()
            };
            listing(pool, &filter, limit, offset)
        }
        "search" => {
            let (limit, offset) = paging(query.limit, query.offset, config.posts_per_page);
            search_posts(pool, query.q.as_deref(), limit, offset)
        }
        other => Err(ApiError::BadRequest(format!("Unknown action '{}'", other))),
    }
}

// ── POST /api/posts ──

#[post("/posts", format = "json", data = "<body>")]
pub fn post_posts(pool: &State<DbPool>, auth: AuthenticatedUser, body: Json<Value>) -> ApiResult {
    match parse_command::<PostCommand>(body.into_inner())? {
        PostCommand::Create(form) => create(pool, &auth, form),
        PostCommand::Update { id, changes } => update(pool, &auth, id, changes),
        PostCommand::Delete { id } => {
            let post = require_post(pool, id)?;
            if !auth.can_edit(post.author_id) {
                return Err(ApiError::forbidden());
            }
            Post::delete(pool, id)?;
            log::info!("Post {} deleted by {}", id, auth.user.username);
            done("Post deleted")
        }
        PostCommand::SetStatus { id, status } => {
            let post = require_post(pool, id)?;
            if !auth.can_edit(post.author_id) {
                return Err(ApiError::forbidden());
            }
            Post::set_status(pool, id, PostStatus::coerce(&status))?;
            let post = require_post(pool, id)?;
            ok("Post status updated", with_details(pool, post, Some(auth.user.id))?)
        }
    }
}

fn create(pool: &DbPool, auth: &AuthenticatedUser, form: PostForm) -> ApiResult {
    let mut errors = FieldErrors::new();
    validate_title(&mut errors, &form.title);
    validate_content(&mut errors, &form.content);
    validate_category(pool, &mut errors, form.category_id)?;
    if let Some(ref tags) = form.tags {
        check_tag_names(&mut errors, tags);
    }
    errors.into_result()?;

    let id = Post::create(pool, auth.user.id, &form)?;
    log::info!("Post {} created by {}", id, auth.user.username);

    let post = require_post(pool, id)?;
    ok("Post created", with_details(pool, post, Some(auth.user.id))?)
}

fn update(pool: &DbPool, auth: &AuthenticatedUser, id: i64, changes: PostUpdate) -> ApiResult {
    let post = require_post(pool, id)?;
    if !auth.can_edit(post.author_id) {
        return Err(ApiError::forbidden());
    }
    if changes.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }

    let mut errors = FieldErrors::new();
    if let Some(ref title) = changes.title {
        validate_title(&mut errors, title);
    }
    if let Some(ref content) = changes.content {
        validate_content(&mut errors, content);
    }
    if let Some(category_id) = changes.category_id {
        validate_category(pool, &mut errors, category_id)?;
    }
    if let Some(ref tags) = changes.tags {
        check_tag_names(&mut errors, tags);
    }
    errors.into_result()?;

    Post::update(pool, id, &changes)?;

    let post = require_post(pool, id)?;
    ok("Post updated", with_details(pool, post, Some(auth.user.id))?)
}

pub fn routes() -> Vec<Route> {
    routes![get_posts, post_posts]
}
