use lextrail_common::define_module_client;
use sqlx::PgPool;

define_module_client! {
    (struct PostgresClient, "postgres")
    client_type: PgPool,
    env: ["DATABASE_URL"],
    setup: async {
        PgPool::clone(crate::connect(false, false).await)
    }
}
