pub mod auth;

pub fn routes() -> Vec<rocket::Route> {
    auth::routes()
}
