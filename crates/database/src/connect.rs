use lextrail_common::EnvVars;

use crate::env::DatabaseEnv;
use crate::schema;

static POOL: tokio::sync::OnceCell<sqlx::PgPool> = tokio::sync::OnceCell::const_new();

/// Connects (once per process) to the database named by `DATABASE_URL`.
/// Later calls return the cached pool and ignore the flags.
pub async fn connect(drop_tables: bool, create_tables: bool) -> &'static sqlx::PgPool {
    POOL.get_or_init(|| async {
        let env = DatabaseEnv::load();
        let pool = sqlx::PgPool::connect(&env.get_env_var("DATABASE_URL"))
            .await
            .expect("failed to connect to database");

        if drop_tables {
            schema::drop_schema(&pool)
                .await
                .expect("failed to drop schema");
        }

        if create_tables {
            schema::create_schema(&pool)
                .await
                .expect("failed to create schema");
        }

        pool
    })
    .await
}
