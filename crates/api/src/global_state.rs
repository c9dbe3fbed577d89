use anyhow::Result;
use sqlx::PgPool;

use lextrail_common::{EnvVars, ModuleClient};
use lextrail_database::PostgresClient;
use lextrail_study::{PgStudyStore, StudyEngine};

use crate::env::ApiServerEnv;

#[derive(Clone)]
pub struct GlobalState {
    pub engine: StudyEngine<PgStudyStore>,
}

impl GlobalState {
    pub async fn new() -> Result<Self> {
        let db = PostgresClient::setup_connection().await;
        let env = ApiServerEnv::load();

        let points = env
            .get_env_var("COMPLETION_POINTS")
            .parse::<i64>()
            .expect("COMPLETION_POINTS must be an integer");

        let engine = StudyEngine::with_points(
            PgStudyStore::new(PgPool::clone(db.get_client())),
            points,
        );
        engine.ensure_seed_achievements().await?;

        Ok(Self { engine })
    }
}
