use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Catcher, Request, Route};

use crate::error::Envelope;
pub use crate::models::settings::MAX_PAGE_SIZE;

pub mod categories;
pub mod comments;
pub mod posts;
pub mod profile;
pub mod reactions;
pub mod search;
pub mod tags;
pub mod upload;


/// Clamp client-supplied paging to `1..=MAX_PAGE_SIZE` and a non-negative offset.
pub(crate) fn paging(limit: Option<i64>, offset: Option<i64>, default_limit: i64) -> (i64, i64) {
    (
        limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_SIZE),
        offset.unwrap_or(0).max(0),
    )
}

pub fn routes() -> Vec<Route> {
    let mut all = Vec::new();
    all.extend(posts::routes());
    all.extend(comments::routes());
    all.extend(categories::routes());
    all.extend(tags::routes());
    all.extend(reactions::routes());
    all.extend(search::routes());
    all.extend(profile::routes());
    all.extend(upload::routes());
    all
}

// ── JSON catchers for everything under /api ──

fn envelope(status: Status, message: &str) -> (Status, Json<Envelope>) {
    (status, Json(Envelope::failure(message)))
}

#[catch(400)]
fn bad_request() -> (Status, Json<Envelope>) {
    envelope(Status::BadRequest, "Bad request")
}

#[catch(401)]
fn unauthorized() -> (Status, Json<Envelope>) {
    envelope(Status::Unauthorized, "Not logged in")
}

#[catch(403)]
fn forbidden() -> (Status, Json<Envelope>) {
    envelope(
        Status::Forbidden,
        "You do not have permission to perform this action",
    )
}

#[catch(404)]
fn not_found() -> (Status, Json<Envelope>) {
    envelope(Status::NotFound, "Resource not found")
}

#[catch(413)]
fn payload_too_large() -> (Status, Json<Envelope>) {
    envelope(Status::PayloadTooLarge, "Request body is too large")
}

#[catch(422)]
fn unprocessable() -> (Status, Json<Envelope>) {
    envelope(Status::UnprocessableEntity, "Invalid request body")
}

#[catch(429)]
fn too_many_requests() -> (Status, Json<Envelope>) {
    envelope(Status::TooManyRequests, "Too many requests")
}

#[catch(500)]
fn server_error(req: &Request<'_>) -> (Status, Json<Envelope>) {
    log::error!("Unhandled failure on {} {}", req.method(), req.uri());
    envelope(Status::InternalServerError, "Internal server error")
}

#[catch(default)]
fn fallback(status: Status, _req: &Request<'_>) -> (Status, Json<Envelope>) {
    envelope(status, status.reason().unwrap_or("Request failed"))
}

pub fn catchers() -> Vec<Catcher> {
    catchers![
        bad_request,
        unauthorized,
        forbidden,
        not_found,
        payload_too_large,
        unprocessable,
        too_many_requests,
        server_error,
        fallback
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_is_clamped() {
        assert_eq!(paging(None, None, 10), (10, 0));
        assert_eq!(paging(Some(0), Some(-5), 10), (1, 0));
        assert_eq!(paging(Some(1000), Some(40), 10), (MAX_PAGE_SIZE, 40));
    }
}
