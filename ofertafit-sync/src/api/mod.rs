//! HTTP API handlers for ofertafit-sync
//!
//! The engine's own trigger surface: health, the secret-guarded sync and
//! ingest triggers, and run reporting. Everything else the storefront does
//! lives outside this service.

pub mod health;
pub mod ingest;
pub mod sync;

pub use health::health_routes;
pub use ingest::ingest_routes;
pub use sync::sync_routes;

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Enforce the shared trigger secret via `Authorization: Bearer <secret>`
///
/// No configured secret disables the guard (development deployments).
pub(crate) fn require_secret(state: &AppState, headers: &HeaderMap) -> ApiResult<()> {
    let Some(expected) = state.config.sync.secret.as_deref() else {
        return Ok(());
    };

    let provided = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match provided {
        Some(secret) if secret == expected => Ok(()),
        Some(_) => Err(ApiError::Unauthorized("Wrong trigger secret".to_string())),
        None => Err(ApiError::Unauthorized(
            "Missing Authorization bearer secret".to_string(),
        )),
    }
}
