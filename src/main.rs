#[macro_use]
extern crate rocket;

use rocket::fairing::{Fairing, Info, Kind};
use rocket::fs::FileServer;
use rocket::http::Header;
use rocket::response::content::RawHtml;
use rocket::{Build, Rocket};
use rocket_dyn_templates::Template;

mod boot;
mod db;
mod error;
mod images;
mod models;
mod rate_limit;
mod routes;
mod security;

#[cfg(test)]
mod tests;

use db::DbPool;
use models::settings::SiteConfig;
use rate_limit::RateLimiter;

/// API responses and admin pages are per-user; keep them out of shared caches.
pub struct NoStore;

#[rocket::async_trait]
impl Fairing for NoStore {
    fn info(&self) -> Info {
        Info { name: "No-Store API and Admin Responses", kind: Kind::Response }
    }

    async fn on_response<'r>(&self, req: &'r rocket::Request<'_>, res: &mut rocket::Response<'r>) {
        let path = req.uri().path();
        if path.starts_with("/api") || path.starts_with("/admin") {
            res.set_header(Header::new("Cache-Control", "no-store, no-cache, must-revalidate, max-age=0"));
            res.set_header(Header::new("Pragma", "no-cache"));
        }
    }
}

#[catch(404)]
fn not_found() -> RawHtml<String> {
    RawHtml("<html><body style='font-family:sans-serif;text-align:center;padding:80px'><h1>404</h1><p>Page not found.</p><a href='/'>← Home</a></body></html>".to_string())
}

#[catch(500)]
fn server_error() -> RawHtml<String> {
    RawHtml("<html><body style='font-family:sans-serif;text-align:center;padding:80px'><h1>500</h1><p>Internal server error.</p><a href='/'>← Home</a></body></html>".to_string())
}

/// The JSON API with its state and catchers, without templates or static files.
pub fn api_rocket(pool: DbPool) -> Rocket<Build> {
    rocket::build()
        .manage(pool)
        .manage(RateLimiter::new())
        .attach(NoStore)
        .mount("/api", routes::api::routes())
        .mount("/api", routes::security::routes())
        .mount("/api/admin", routes::admin::routes())
        .register("/api", routes::api::catchers())
        .register("/", catchers![not_found, server_error])
}

#[launch]
fn rocket() -> _ {
    env_logger::init();

    // Boot check: create directories, report missing templates
    boot::run();

    let pool = db::init_pool().expect("Failed to initialize database pool");
    db::run_migrations(&pool).expect("Failed to run database migrations");
    db::seed_defaults(&pool).expect("Failed to seed default settings");

    match security::auth::cleanup_expired_sessions(&pool) {
        Ok(0) => {}
        Ok(n) => log::info!("Removed {} expired session(s)", n),
        Err(e) => log::warn!("Session cleanup failed: {}", e),
    }

    let config = SiteConfig::load(&pool);
    boot::ensure_writable_dir(&config.uploads_dir).expect("Uploads directory is not usable");
    log::info!("Serving uploads from {}", config.uploads_dir);

    api_rocket(pool)
        .attach(Template::fairing())
        .mount("/", routes::public::routes())
        .mount("/admin", routes::admin::page_routes())
        .mount("/uploads", FileServer::from(config.uploads_dir.as_str()))
}
