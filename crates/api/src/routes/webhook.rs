use serde::{Deserialize, Serialize};
use serde_json::json;
use axum::{
    extract::State,
    http::StatusCode,
    routing::post, Json, Router,
};

use crate::{response::{AppError, AppSuccess}, GlobalState};

pub fn webhook_routes() -> Router<GlobalState> {
    Router::new()
        .route("/webhook/purchase-completed", post(purchase_completed))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PurchaseCompletedEvent {
    pub customer_email: String,
    pub customer_name: String,
}

/// The payment provider retries on non-2xx, so an event for an email we do
/// not know is logged and acknowledged rather than rejected.
async fn purchase_completed(
    State(state): State<GlobalState>,
    Json(payload): Json<PurchaseCompletedEvent>,
) -> Result<AppSuccess, AppError> {
    let matched = state.engine.approve_purchase(&payload.customer_email).await?;

    if matched {
        tracing::info!(
            "[/webhook/purchase-completed] purchase by {} ({}) approved",
            payload.customer_name, payload.customer_email
        );
    }

    Ok(AppSuccess::new(StatusCode::OK, "Webhook received", json!({
        "matched": matched
    })))
}
