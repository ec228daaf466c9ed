use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::token::Token;
use crate::ring::TokenParams;
use crate::AppState;

// ── Request / Response DTOs ──────────────────────────────────

#[derive(Deserialize)]
pub struct CreateTokenRequest {
    pub duration_ms: u64,
    pub not_before: Option<DateTime<Utc>>,
    pub not_after: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sticky: bool,
    #[serde(default)]
    pub skip_verification: bool,
}

/// A token as shown to callers: the stored record plus the validity
/// predicates evaluated at response time, so pollers don't have to
/// re-derive the window logic.
#[derive(Serialize)]
pub struct TokenView {
    pub id: String,
    pub duration_ms: u64,
    pub not_before: Option<DateTime<Utc>>,
    pub not_after: Option<DateTime<Utc>>,
    pub sticky: bool,
    pub skip_verification: bool,
    pub status: crate::models::token::TokenStatus,
    pub failed_count: u32,
    pub valid: bool,
    pub deny_reason: Option<&'static str>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TokenView {
    pub fn render(token: Token, now: DateTime<Utc>) -> Self {
        let valid = token.is_valid(now);
        let deny_reason = token.deny_reason(now).map(|r| r.code());
        Self {
            id: token.id,
            duration_ms: token.duration_ms,
            not_before: token.not_before,
            not_after: token.not_after,
            sticky: token.sticky,
            skip_verification: token.skip_verification,
            status: token.status,
            failed_count: token.failed_count,
            valid,
            deny_reason,
            created_at: token.created_at,
            updated_at: token.updated_at,
        }
    }
}

// ── Management handlers (mounted under /api/v1, admin key required) ──

/// GET /api/v1/tokens
pub async fn list_tokens(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<TokenView>>, AppError> {
    let now = state.service.now();
    let tokens = state.service.list_tokens().await?;
    Ok(Json(
        tokens
            .into_iter()
            .map(|t| TokenView::render(t, now))
            .collect(),
    ))
}

/// POST /api/v1/tokens
pub async fn create_token(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateTokenRequest>,
) -> Result<(StatusCode, Json<TokenView>), AppError> {
    let token = state
        .service
        .create_token(TokenParams {
            duration_ms: payload.duration_ms,
            not_before: payload.not_before,
            not_after: payload.not_after,
            sticky: payload.sticky,
            skip_verification: payload.skip_verification,
        })
        .await?;
    let now = state.service.now();
    Ok((StatusCode::CREATED, Json(TokenView::render(token, now))))
}

/// GET /api/v1/tokens/:id
pub async fn get_token(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TokenView>, AppError> {
    let token = state.service.get_token(&id).await?;
    let now = state.service.now();
    Ok(Json(TokenView::render(token, now)))
}

/// DELETE /api/v1/tokens/:id
pub async fn delete_token(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.service.delete_token(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/tokens/reset-samples
pub async fn reset_sample_tokens(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<TokenView>>, AppError> {
    let tokens = state.service.reset_sample_tokens().await?;
    let now = state.service.now();
    Ok(Json(
        tokens
            .into_iter()
            .map(|t| TokenView::render(t, now))
            .collect(),
    ))
}

// ── Public ring handlers ─────────────────────────────────────

/// POST /ring/:id: admit a ring request.
///
/// Tokens normally require the admin key; a token minted with
/// `skip_verification` may be rung by anyone holding its id.
pub async fn ring_token(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<TokenView>), AppError> {
    let token = state.service.get_token(&id).await?;
    if !token.skip_verification {
        let verified =
            super::provided_admin_key(&headers) == Some(state.config.admin_key.as_str());
        if !verified {
            return Err(AppError::VerificationRequired);
        }
    }

    let claimed = state.service.ring_token(&id).await?;
    let now = state.service.now();
    Ok((StatusCode::ACCEPTED, Json(TokenView::render(claimed, now))))
}

/// GET /ring/:id: poll a token's state.
///
/// Unauthenticated: the unguessable id is the capability. Completion is
/// never pushed; callers poll until `status` leaves USING and read
/// `failed_count` to see whether the bell physically rang.
pub async fn ring_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TokenView>, AppError> {
    let token = state.service.get_token(&id).await?;
    let now = state.service.now();
    Ok(Json(TokenView::render(token, now)))
}
