use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::models::token::DenyReason;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("token not found")]
    UnknownToken,

    #[error("token is not activatable: {0}")]
    NotActivatable(DenyReason),

    #[error("a ring for this token is already in progress")]
    AlreadyInProgress,

    #[error("token is currently ringing and cannot be deleted")]
    TokenInUse,

    #[error("verification required")]
    VerificationRequired,

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::UnknownToken,
            StoreError::InUse => AppError::TokenInUse,
            StoreError::AlreadyExists => {
                AppError::Internal(anyhow::anyhow!("token id collision"))
            }
            StoreError::Unavailable(msg) => AppError::StoreUnavailable(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, msg) = match &self {
            AppError::InvalidParameters(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "invalid_parameters",
                msg.clone(),
            ),
            AppError::UnknownToken => (
                StatusCode::NOT_FOUND,
                "token_not_found",
                "unknown token".to_string(),
            ),
            AppError::NotActivatable(reason) => (
                StatusCode::CONFLICT,
                reason.code(),
                reason.message().to_string(),
            ),
            AppError::AlreadyInProgress => (
                StatusCode::CONFLICT,
                "ring_in_progress",
                "a ring for this token is already in progress".to_string(),
            ),
            AppError::TokenInUse => (
                StatusCode::LOCKED,
                "token_in_use",
                "token is currently ringing; try again once it finishes".to_string(),
            ),
            AppError::VerificationRequired => (
                StatusCode::UNAUTHORIZED,
                "verification_required",
                "this token requires the admin key to ring".to_string(),
            ),
            AppError::StoreUnavailable(e) => {
                tracing::error!("store error: {}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "store_unavailable",
                    "token store is unavailable".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "code": code,
            }
        }));

        (status, body).into_response()
    }
}
