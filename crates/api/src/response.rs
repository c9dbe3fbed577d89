use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use lextrail_study::StudyError;

pub type AppSuccess = GenericResponse;

/// Every endpoint answers with this envelope, success or failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenericResponse {
    pub status: u16,
    pub message: String,
    pub data: serde_json::Value,
}

impl GenericResponse {
    pub fn new(status: StatusCode, message: &str, data: serde_json::Value) -> Self {
        Self {
            status: status.as_u16(),
            message: message.to_string(),
            data,
        }
    }
}

impl IntoResponse for GenericResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

#[derive(Debug)]
pub struct AppError(pub StatusCode, pub anyhow::Error);

impl AppError {
    pub fn new(status: StatusCode, err: anyhow::Error) -> Self {
        Self(status, err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("CODE: {}, MESSAGE: {}", self.0.as_u16(), self.1);
        GenericResponse::new(self.0, &self.1.to_string(), json!({})).into_response()
    }
}

/// Lets handlers bail with `?` on engine calls and still answer with the
/// right status code.
impl From<StudyError> for AppError {
    fn from(err: StudyError) -> Self {
        let status = match &err {
            StudyError::Validation(_) => StatusCode::BAD_REQUEST,
            StudyError::NotFound(_) => StatusCode::NOT_FOUND,
            StudyError::Conflict(_) => StatusCode::CONFLICT,
            StudyError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self(status, anyhow::Error::from(err))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self(StatusCode::BAD_REQUEST, err)
    }
}
