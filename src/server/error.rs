//! Error types for the server

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::data::{ObservationError, FEATURE_COLUMNS};
use crate::error::ExoplanetError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Model not loaded")]
    ModelUnavailable,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ObservationError> for ServerError {
    fn from(err: ObservationError) -> Self {
        match err {
            ObservationError::MissingFields(fields) => ServerError::MissingFields(fields),
            other => ServerError::InvalidInput(other.to_string()),
        }
    }
}

impl From<ExoplanetError> for ServerError {
    fn from(err: ExoplanetError) -> Self {
        match err {
            ExoplanetError::ModelNotFitted => ServerError::ModelUnavailable,
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ServerError::MissingFields(_) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": self.to_string(),
                    "required_fields": FEATURE_COLUMNS,
                }),
            ),
            ServerError::InvalidInput(msg) | ServerError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "status": "error", "error": msg }),
            ),
            ServerError::ModelUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "status": "error", "error": "Model not loaded" }),
            ),
            ServerError::Internal(msg) => {
                tracing::error!(detail = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "status": "error", "error": "An internal error occurred during prediction" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
