mod admin;
mod auth;
mod misc;
mod study;
mod webhook;

pub use admin::admin_routes;
pub use auth::auth_routes;
pub use misc::misc_routes;
pub use study::study_routes;
pub use webhook::webhook_routes;
