pub mod admin;
pub mod category;
pub mod comment;
pub mod dashboard;
pub mod post;
pub mod reaction;
pub mod settings;
pub mod tag;
pub mod user;
