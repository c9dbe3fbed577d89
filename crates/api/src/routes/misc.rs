use anyhow::anyhow;
use axum::{routing::get, Router, http::StatusCode};
use prometheus::TextEncoder;

use crate::{GlobalState, response::AppError};

pub fn misc_routes() -> Router<GlobalState> {
    Router::new()
        .route("/health",
            get(|| async { "OK" })
        )
        .route("/metrics",
            get(metrics)
        )
}

async fn metrics() -> Result<String, AppError> {
    let mut buffer = String::new();
    TextEncoder::new()
        .encode_utf8(&prometheus::gather(), &mut buffer)
        .map_err(|e| AppError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            anyhow!("Failed to encode metrics: {}", e)
        ))?;
    Ok(buffer)
}
