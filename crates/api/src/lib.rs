mod env;
mod global_state;
mod metrics;
mod middleware;
mod response;
mod routes;
mod utils;

pub use routes::{
    admin_routes,
    auth_routes,
    misc_routes,
    study_routes,
    webhook_routes,
};

pub use env::ApiServerEnv;
pub use global_state::GlobalState;
pub use middleware::{authenticate, ensure_account, ensure_admin};
pub use response::{AppError, AppSuccess};
pub use utils::setup_tracing;
