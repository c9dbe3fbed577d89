use serde::{Deserialize, Serialize};
use serde_json::json;
use axum::{
    extract::State,
    http::StatusCode,
    routing::post, Json, Router,
};

use crate::{response::{AppError, AppSuccess}, GlobalState};

pub fn auth_routes() -> Router<GlobalState> {
    Router::new()
        .route("/auth/register",
            post(register)
        )
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub display_name: String,
}

/// Accounts start unapproved; an admin or a purchase webhook flips them.
async fn register(
    State(state): State<GlobalState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<AppSuccess, AppError> {
    let user = state
        .engine
        .register_user(&payload.email, &payload.display_name)
        .await?;
    tracing::info!("[/auth/register] new account {} awaiting approval", user.email);

    Ok(AppSuccess::new(StatusCode::CREATED, "Account created, awaiting approval", json!({
        "user_id": user.id
    })))
}
