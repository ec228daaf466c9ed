use std::sync::Arc;

use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};

use crate::AppState;

pub mod handlers;

/// Build the management API router.
/// All routes are relative — the caller mounts this under `/api/v1`.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/tokens",
            get(handlers::list_tokens).post(handlers::create_token),
        )
        .route("/tokens/reset-samples", post(handlers::reset_sample_tokens))
        .route(
            "/tokens/:id",
            get(handlers::get_token).delete(handlers::delete_token),
        )
        .layer(middleware::from_fn(admin_auth))
        .fallback(fallback_404)
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// The key management callers must present. Falls back to the same
/// development placeholder `config::load` warns about.
pub(crate) fn expected_admin_key() -> String {
    std::env::var("BELLGATE_ADMIN_KEY")
        .unwrap_or_else(|_| crate::config::ADMIN_KEY_PLACEHOLDER.into())
}

/// Pull the caller's key from `X-Admin-Key` or a bearer Authorization.
pub(crate) fn provided_admin_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("x-admin-key")
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::trim)
        })
}

/// Middleware: validates the admin key on every management route.
async fn admin_auth(req: Request, next: Next) -> Result<Response, StatusCode> {
    let expected = expected_admin_key();
    match provided_admin_key(req.headers()) {
        Some(k) if k == expected => Ok(next.run(req).await),
        Some(_) => {
            tracing::warn!("management API: invalid admin key");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            tracing::warn!("management API: missing X-Admin-Key header");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
