//! Ingest trigger endpoint

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::ingest::{CandidateItem, IngestReport};
use crate::AppState;

use super::require_secret;

/// One candidate batch for one site category
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub category: String,
    pub candidates: Vec<CandidateItem>,
}

/// POST /ingest/run
///
/// Secret-guarded. Feeds the batch through the admission pipeline and
/// responds with what happened to every candidate class.
pub async fn trigger_ingest(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<IngestRequest>,
) -> ApiResult<Json<IngestReport>> {
    require_secret(&state, &headers)?;

    let report = state
        .pipeline
        .run(&request.category, request.candidates)
        .await?;
    Ok(Json(report))
}

/// Build ingest routes
pub fn ingest_routes() -> Router<AppState> {
    Router::new().route("/ingest/run", post(trigger_ingest))
}
