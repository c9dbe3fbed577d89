mod client;
mod connect;
mod env;
mod schema;

pub use client::PostgresClient;
pub use connect::connect;
pub use env::DatabaseEnv;
pub use schema::{create_schema, drop_schema};
