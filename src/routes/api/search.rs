use rocket::{Route, State};

use crate::db::DbPool;
use crate::error::ApiResult;
use crate::models::settings::SiteConfig;
use crate::routes::api::paging;
use crate::routes::api::posts::search_posts;

/// Standalone search endpoint; same semantics as `GET /api/posts?action=search`.
#[get("/search?<q>&<limit>&<offset>")]
pub fn search(
    pool: &State<DbPool>,
    q: Option<&str>,
    limit: Option<i64>,
    offset: Option<i64>,
) -> ApiResult {
    let config = SiteConfig::load(pool);
    let (limit, offset) = paging(limit, offset, config.posts_per_page);
    search_posts(pool, q, limit, offset)
}

pub fn routes() -> Vec<Route> {
    routes![search]
}
