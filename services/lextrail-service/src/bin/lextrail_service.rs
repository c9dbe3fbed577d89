use anyhow::Result;
use axum::Router;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use lextrail_api::{
    admin_routes, auth_routes, misc_routes, setup_tracing, study_routes, webhook_routes,
    GlobalState,
};
use lextrail_database::connect;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    setup_tracing();

    let cors = CorsLayer::very_permissive();
    let trace = TraceLayer::new_for_http();

    // create tables on boot; the client inside GlobalState reuses this pool
    connect(false, true).await;
    let global_state = GlobalState::new().await?;

    let app = Router::new()
        .merge(misc_routes())
        .merge(auth_routes())
        .merge(study_routes())
        .merge(admin_routes())
        .merge(webhook_routes())
        .layer(TimeoutLayer::new(std::time::Duration::from_secs(30)))
        .layer(cors)
        .layer(trace)
        .with_state(global_state);

    let port: u16 = std::env::var("PORT")
        .unwrap_or("3033".into())
        .parse()
        .expect("failed to convert to number");

    let listener = tokio::net::TcpListener::bind(format!(":::{port}"))
        .await
        .unwrap();

    tracing::info!("LISTENING ON {port}");
    axum::serve(listener, app.into_make_service()).await.unwrap();
    Ok(())
}
