use rocket::http::{RawStr, Status};
use rocket::response::Redirect;
use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::{json, Value};

use crate::db::DbPool;
use crate::models::category::Category;
use crate::models::comment::Comment;
use crate::models::post::{Post, PostFilter, PostOrder, PostStatus};
use crate::models::reaction::Reaction;
use crate::models::settings::SiteConfig;
use crate::models::tag::Tag;
use crate::models::user::User;
use crate::routes::api::posts::can_view;
use crate::security::auth::Viewer;

const EXCERPT_CHARS: usize = 280;

/// Render `name` with the site-wide context (site name, current user) merged under `extra`.
pub(crate) fn render(name: &'static str, config: &SiteConfig, viewer: &Viewer, extra: Value) -> Template {
    let mut context = json!({
        "site_name": config.site_name,
        "viewer": viewer.user.as_ref().map(|u| json!({ "id": u.id, "username": u.username })),
        "is_admin": viewer.capability.is_admin,
    });
    if let (Some(base), Value::Object(extra)) = (context.as_object_mut(), extra) {
        base.extend(extra);
    }
    Template::render(name, &context)
}

fn internal(e: String) -> Status {
    log::error!("Page render failed: {}", e);
    Status::InternalServerError
}

fn card(post: &Post) -> Value {
    json!({
        "id": post.id,
        "title": post.title,
        "excerpt": post.excerpt(EXCERPT_CHARS),
        "author_username": post.author_username,
        "category_id": post.category_id,
        "category_name": post.category_name,
        "featured_image": post.featured_image,
        "views_count": post.views_count,
        "created_at": post.created_at.format("%B %-d, %Y").to_string(),
    })
}

/// `(page, offset, total_pages)` with the requested page pulled into `1..=total_pages`.
fn page_window(requested: Option<i64>, per_page: i64, total: i64) -> (i64, i64, i64) {
    let per_page = per_page.max(1);
    let total_pages = (total.max(0) / per_page + i64::from(total % per_page > 0)).max(1);
    let page = requested.unwrap_or(1).clamp(1, total_pages);
    (page, (page - 1) * per_page, total_pages)
}

/// One page of posts plus the pager numbers the templates need.
fn paged(pool: &DbPool, filter: &PostFilter, per_page: i64, page: Option<i64>) -> Result<Value, String> {
    let total = Post::count(pool, filter)?;
    let (page, offset, total_pages) = page_window(page, per_page, total);
    let posts = Post::list(pool, filter, per_page, offset)?;
    Ok(json!({
        "posts": posts.iter().map(card).collect::<Vec<_>>(),
        "total": total,
        "page": page,
        "total_pages": total_pages,
        "has_prev": page > 1,
        "has_next": page < total_pages,
    }))
}

// ── Homepage ──

#[get("/?<page>")]
pub fn home(pool: &State<DbPool>, viewer: Viewer, page: Option<i64>) -> Result<Template, Status> {
    let config = SiteConfig::load(pool);
    let listing = paged(pool, &PostFilter::published(), config.posts_per_page, page).map_err(internal)?;
    let featured_filter = PostFilter {
        featured_only: true,
        order: PostOrder::MostViewed,
        ..PostFilter::published()
    };
    let featured = Post::list(pool, &featured_filter, config.featured_posts_limit, 0).map_err(internal)?;
    let categories = Category::list(pool).map_err(internal)?;

    Ok(render(
        "home",
        &config,
        &viewer,
        json!({
            "listing": listing,
            "featured": featured.iter().map(card).collect::<Vec<_>>(),
            "categories": categories,
        }),
    ))
}

// ── Single post ──

#[get("/post/<id>")]
pub fn post_page(pool: &State<DbPool>, viewer: Viewer, id: i64) -> Result<Template, Status> {
    let config = SiteConfig::load(pool);
    let mut post = Post::find_by_id(pool, id)
        .map_err(internal)?
        .filter(|p| can_view(p, viewer.user_id(), &viewer.capability))
        .ok_or(Status::NotFound)?;

    if post.status == PostStatus::Published {
        Post::increment_views(pool, post.id).map_err(internal)?;
        post.views_count += 1;
    }

    let tags = Tag::for_post(pool, post.id).map_err(internal)?;
    let threads = Comment::threads_for_post(pool, post.id, viewer.capability.can_moderate())
        .map_err(internal)?;
    let reactions = Reaction::summary(pool, post.id, viewer.user_id()).map_err(internal)?;

    Ok(render(
        "post",
        &config,
        &viewer,
        json!({
            "post": post,
            "published_on": post.created_at.format("%B %-d, %Y").to_string(),
            "can_edit": viewer.can_edit(post.author_id),
            "tags": tags,
            "comments": threads,
            "reactions": reactions,
        }),
    ))
}

// ── Listings ──

#[get("/search?<q>&<page>")]
pub fn search_page(
    pool: &State<DbPool>,
    viewer: Viewer,
    q: Option<&str>,
    page: Option<i64>,
) -> Result<Template, Status> {
    let config = SiteConfig::load(pool);
    let term = q.map(str::trim).unwrap_or_default();
    let listing = if term.is_empty() {
        Value::Null
    } else {
        let filter = PostFilter {
            search: Some(term.to_string()),
            ..PostFilter::published()
        };
        paged(pool, &filter, config.posts_per_page, page).map_err(internal)?
    };
    Ok(render(
        "list",
        &config,
        &viewer,
        json!({
            "heading": if term.is_empty() { "Search".to_string() } else { format!("Search: {}", term) },
            "query": term,
            "listing": listing,
            "page_prefix": format!("/search?q={}&", RawStr::new(term).percent_encode()),
        }),
    ))
}

#[get("/category/<id>?<page>")]
pub fn category_page(
    pool: &State<DbPool>,
    viewer: Viewer,
    id: i64,
    page: Option<i64>,
) -> Result<Template, Status> {
    let config = SiteConfig::load(pool);
    let category = Category::find_by_id(pool, id)
        .map_err(internal)?
        .ok_or(Status::NotFound)?;
    let filter = PostFilter {
        category_id: Some(id),
        ..PostFilter::published()
    };
    let listing = paged(pool, &filter, config.posts_per_page, page).map_err(internal)?;
    Ok(render(
        "list",
        &config,
        &viewer,
        json!({
            "heading": category.name,
            "description": category.description,
            "listing": listing,
            "page_prefix": format!("/category/{}?", id),
        }),
    ))
}

#[get("/tag/<name>?<page>")]
pub fn tag_page(
    pool: &State<DbPool>,
    viewer: Viewer,
    name: &str,
    page: Option<i64>,
) -> Result<Template, Status> {
    let config = SiteConfig::load(pool);
    let tag = Tag::find_by_name(pool, name)
        .map_err(internal)?
        .ok_or(Status::NotFound)?;
    let filter = PostFilter {
        tag: Some(tag.name.clone()),
        ..PostFilter::published()
    };
    let listing = paged(pool, &filter, config.posts_per_page, page).map_err(internal)?;
    Ok(render(
        "list",
        &config,
        &viewer,
        json!({
            "heading": format!("Tagged \u{201c}{}\u{201d}", tag.name),
            "listing": listing,
            "page_prefix": format!("/tag/{}?", RawStr::new(&tag.name).percent_encode()),
        }),
    ))
}

// ── Account pages ──

#[get("/login")]
pub fn login_page(pool: &State<DbPool>, viewer: Viewer) -> Result<Template, Redirect> {
    if viewer.user.is_some() {
        return Err(Redirect::to("/"));
    }
    let config = SiteConfig::load(pool);
    Ok(render("login", &config, &viewer, json!({})))
}

#[get("/register")]
pub fn register_page(pool: &State<DbPool>, viewer: Viewer) -> Result<Template, Redirect> {
    if viewer.user.is_some() {
        return Err(Redirect::to("/"));
    }
    let config = SiteConfig::load(pool);
    Ok(render("register", &config, &viewer, json!({})))
}

#[get("/profile")]
pub fn profile_page(pool: &State<DbPool>, viewer: Viewer) -> Result<Template, Redirect> {
    let user = match viewer.user {
        Some(ref u) => u,
        None => return Err(Redirect::to("/login")),
    };
    let config = SiteConfig::load(pool);
    let published = User::published_post_count(pool, user.id).unwrap_or_else(|e| {
        log::error!("Post count for user {} failed: {}", user.id, e);
        0
    });
    let mine = PostFilter {
        author_id: Some(user.id),
        ..Default::default()
    };
    let posts = Post::list(pool, &mine, config.posts_per_page, 0).unwrap_or_else(|e| {
        log::error!("Listing posts for user {} failed: {}", user.id, e);
        Vec::new()
    });
    Ok(render(
        "profile",
        &config,
        &viewer,
        json!({
            "user": user,
            "role": viewer.capability.role,
            "published_posts": published,
            "posts": posts.iter().map(|p| json!({ "card": card(p), "status": p.status })).collect::<Vec<_>>(),
        }),
    ))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        home,
        post_page,
        search_page,
        category_page,
        tag_page,
        login_page,
        register_page,
        profile_page,
    ]
}
