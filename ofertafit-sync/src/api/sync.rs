//! Sync trigger and run reporting endpoints

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::db;
use crate::error::ApiResult;
use crate::services::sync_orchestrator::{RunOverrides, RunReport};
use crate::AppState;

use super::require_secret;

/// POST /sync/run
///
/// Secret-guarded trigger. The body carries optional per-run overrides and
/// may be omitted entirely. Responds with the finalized run statistics, or
/// a lock-held report when another run is active.
pub async fn trigger_run(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<RunOverrides>>,
) -> ApiResult<Json<RunReport>> {
    require_secret(&state, &headers)?;

    let overrides = body.map(|Json(o)| o).unwrap_or_default();
    let report = state.orchestrator.run(&overrides).await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct RunsQuery {
    limit: Option<u32>,
}

/// GET /sync/runs?limit=N
///
/// Recent run records, newest first. Default limit 20.
pub async fn list_runs(
    State(state): State<AppState>,
    Query(query): Query<RunsQuery>,
) -> ApiResult<Json<Vec<ofertafit_common::models::RunRecord>>> {
    let limit = query.limit.unwrap_or(20).min(500);
    let runs = db::runs::recent_runs(&state.db, limit).await?;
    Ok(Json(runs))
}

/// Build sync routes
pub fn sync_routes() -> Router<AppState> {
    Router::new()
        .route("/sync/run", post(trigger_run))
        .route("/sync/runs", get(list_runs))
}
