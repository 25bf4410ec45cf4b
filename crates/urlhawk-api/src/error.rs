//! Error types for the urlhawk-api crate.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use urlhawk_engine::EngineError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Missing 'url' parameter")]
    MissingUrl,

    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::MissingUrl => StatusCode::BAD_REQUEST,
            ApiError::Engine(EngineError::UnknownProbe { .. }) => StatusCode::NOT_FOUND,
            ApiError::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(serde_json::json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}
