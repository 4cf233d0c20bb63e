use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::branding::BrandError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Letterhead missing: {0}")]
    LetterheadMissing(String),

    #[error("Branding error: {0}")]
    Brand(#[from] BrandError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::LetterheadMissing(msg) => {
                tracing::error!("Letterhead missing: {msg}");
                (StatusCode::BAD_REQUEST, "LETTERHEAD_MISSING", msg.clone())
            }
            AppError::Brand(e) if e.is_letterhead_error() => {
                tracing::error!("Letterhead rejected: {e}");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "LETTERHEAD_ERROR",
                    e.to_string(),
                )
            }
            AppError::Brand(e) => {
                tracing::error!("Branding run failed: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "BRANDING_ERROR",
                    "The branding run could not be completed".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
