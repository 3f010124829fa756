pub mod login;
pub mod logout;
pub mod register;

pub fn routes() -> Vec<rocket::Route> {
    routes![login::login, logout::logout, register::register]
}
