use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::FeedbackError;
use crate::services::{ChatError, SessionError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Session not found")]
    SessionNotFound,

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Invalid feedback: {0}")]
    Validation(#[from] FeedbackError),

    #[error("{0}")]
    Session(#[from] SessionError),

    #[error("HueBot error: {0}")]
    Chat(#[from] ChatError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Unable to decode image: {0}")]
    Decode(String),

    #[error("Number of colors must be at least 1, got {0}")]
    InvalidK(usize),

    #[error("Extraction task failed: {0}")]
    Task(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::SessionNotFound => StatusCode::NOT_FOUND,
            ApiError::Extract(ExtractError::Task(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Extract(_) => StatusCode::BAD_REQUEST,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Session(SessionError::Busy) => StatusCode::CONFLICT,
            ApiError::Session(SessionError::EmptyQuestion) => StatusCode::BAD_REQUEST,
            ApiError::Chat(ChatError::MissingApiKey) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Chat(_) => StatusCode::BAD_GATEWAY,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self, "Request failed");
        }

        let body = Json(json!({
            "status": status.as_u16(),
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
