pub mod comments;
pub mod dashboard;
pub mod settings;
pub mod users;

/// JSON endpoints, mounted under `/api/admin`.
pub fn routes() -> Vec<rocket::Route> {
    routes![
        dashboard::dashboard,
        users::list_users,
        users::manage_user,
        comments::moderate,
        settings::get_settings,
        settings::save_settings,
    ]
}

/// HTML pages, mounted under `/admin`.
pub fn page_routes() -> Vec<rocket::Route> {
    routes![dashboard::dashboard_page]
}
