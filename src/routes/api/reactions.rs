use rocket::serde::json::Json;
use rocket::{Route, State};
use serde::Deserialize;

use crate::db::DbPool;
use crate::error::{ok, ApiError, ApiResult};
use crate::models::reaction::{Reaction, ReactionKind};
use crate::routes::api::posts::visible_post;
use crate::security::auth::{AuthenticatedUser, Viewer};

#[derive(Debug, Deserialize)]
pub struct ReactionForm {
    pub post_id: i64,
    pub reaction: String,
}

#[get("/reactions?<post_id>")]
pub fn get_reactions(pool: &State<DbPool>, viewer: Viewer, post_id: i64) -> ApiResult {
    visible_post(pool, post_id, viewer.user_id(), &viewer.capability)?;
    ok(
        "Reactions retrieved",
        Reaction::summary(pool, post_id, viewer.user_id())?,
    )
}

#[post("/reactions", format = "json", data = "<form>")]
pub fn react(pool: &State<DbPool>, auth: AuthenticatedUser, form: Json<ReactionForm>) -> ApiResult {
    let kind = ReactionKind::parse(form.reaction.trim())
        .ok_or_else(|| ApiError::field("reaction", "Reaction must be 'like' or 'dislike'"))?;
    visible_post(pool, form.post_id, Some(auth.user.id), &auth.capability)?;
    Reaction::upsert(pool, form.post_id, auth.user.id, kind)?;
    ok(
        "Reaction saved",
        Reaction::summary(pool, form.post_id, Some(auth.user.id))?,
    )
}

#[delete("/reactions?<post_id>")]
pub fn unreact(pool: &State<DbPool>, auth: AuthenticatedUser, post_id: i64) -> ApiResult {
    let removed = Reaction::remove(pool, post_id, auth.user.id)?;
    let message = if removed {
        "Reaction removed"
    } else {
        "No reaction to remove"
    };
    ok(message, Reaction::summary(pool, post_id, Some(auth.user.id))?)
}

pub fn routes() -> Vec<Route> {
    routes![get_reactions, react, unreact]
}
