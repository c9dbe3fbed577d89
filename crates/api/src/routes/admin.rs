use serde_json::json;
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode, middleware,
    routing::{delete, get, post}, Router,
};
use sqlx::types::Uuid;

use crate::{
    ensure_admin,
    middleware::authenticate,
    response::{AppError, AppSuccess},
    GlobalState,
};

pub fn admin_routes() -> Router<GlobalState> {
    Router::new()
        .route("/admin/users/pending",
            get(pending_users)
            .route_layer(middleware::from_fn(authenticate))
        )

        .route("/admin/users/{user_id}/approve",
            post(approve_user)
            .route_layer(middleware::from_fn(authenticate))
        )

        .route("/admin/users/{user_id}",
            delete(delete_user)
            .route_layer(middleware::from_fn(authenticate))
        )

        .route("/admin/laws/{law_id}",
            delete(delete_law)
            .route_layer(middleware::from_fn(authenticate))
        )

        .route("/admin/achievements/reload",
            post(reload_achievements)
            .route_layer(middleware::from_fn(authenticate))
        )
}

async fn pending_users(
    State(state): State<GlobalState>,
    Extension(admin_id): Extension<Uuid>,
) -> Result<AppSuccess, AppError> {
    ensure_admin(&state, admin_id).await?;
    let pending = state.engine.pending_users().await?;
    Ok(AppSuccess::new(StatusCode::OK, "Pending users fetched successfully", json!(pending)))
}

async fn approve_user(
    State(state): State<GlobalState>,
    Extension(admin_id): Extension<Uuid>,
    Path(user_id): Path<Uuid>,
) -> Result<AppSuccess, AppError> {
    ensure_admin(&state, admin_id).await?;
    state.engine.approve_user(user_id).await?;
    tracing::info!("[/admin/users/approve] {} approved by {}", user_id, admin_id);
    Ok(AppSuccess::new(StatusCode::OK, "User approved successfully", json!(())))
}

async fn delete_user(
    State(state): State<GlobalState>,
    Extension(admin_id): Extension<Uuid>,
    Path(user_id): Path<Uuid>,
) -> Result<AppSuccess, AppError> {
    ensure_admin(&state, admin_id).await?;
    let report = state.engine.purge_user(user_id).await?;
    tracing::info!("[/admin/users] {} purged by {}", user_id, admin_id);
    Ok(AppSuccess::new(StatusCode::OK, "User deleted successfully", json!(report)))
}

async fn delete_law(
    State(state): State<GlobalState>,
    Extension(admin_id): Extension<Uuid>,
    Path(law_id): Path<Uuid>,
) -> Result<AppSuccess, AppError> {
    ensure_admin(&state, admin_id).await?;
    let report = state.engine.purge_law(law_id).await?;
    tracing::info!("[/admin/laws] {} purged by {}", law_id, admin_id);
    Ok(AppSuccess::new(StatusCode::OK, "Law deleted successfully", json!(report)))
}

async fn reload_achievements(
    State(state): State<GlobalState>,
    Extension(admin_id): Extension<Uuid>,
) -> Result<AppSuccess, AppError> {
    ensure_admin(&state, admin_id).await?;
    let count = state.engine.reload_catalog().await?;
    Ok(AppSuccess::new(StatusCode::OK, "Achievement catalog reloaded", json!({
        "achievements": count
    })))
}
