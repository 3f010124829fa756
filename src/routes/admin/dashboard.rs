use rocket::response::Redirect;
use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::json;

use crate::db::DbPool;
use crate::error::{ok, ApiResult};
use crate::models::dashboard::Dashboard;
use crate::models::settings::SiteConfig;
use crate::routes::public::render;
use crate::security::auth::{AdminUser, Viewer};

// ── Dashboard ──

#[get("/dashboard")]
pub fn dashboard(pool: &State<DbPool>, _admin: AdminUser) -> ApiResult {
    let config = SiteConfig::load(pool);
    ok(
        "Dashboard retrieved",
        Dashboard::load(pool, config.recent_posts_limit)?,
    )
}

#[get("/")]
pub fn dashboard_page(pool: &State<DbPool>, viewer: Viewer) -> Result<Template, Redirect> {
    if !viewer.capability.is_admin {
        return Err(Redirect::to("/login"));
    }
    let config = SiteConfig::load(pool);
    let dashboard = match Dashboard::load(pool, config.recent_posts_limit) {
        Ok(d) => Some(d),
        Err(e) => {
            log::error!("Dashboard load failed: {}", e);
            None
        }
    };
    Ok(render(
        "admin",
        &config,
        &viewer,
        json!({ "page_title": "Dashboard", "dashboard": dashboard }),
    ))
}
