//! HTTP trigger surface integration tests
//!
//! Drives the router in-process against an in-memory database: health,
//! the bearer-secret guard on the trigger endpoints, run reporting and a
//! full ingest round trip.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use ofertafit_common::config::AppConfig;
use ofertafit_sync::ingest::{CatalogAdmissionGate, IngestPipeline};
use ofertafit_sync::services::{LogNotifier, ProviderRegistry, SyncOrchestrator};
use ofertafit_sync::{build_router, AppState};

async fn test_state(secret: Option<&str>) -> AppState {
    let db = sqlx::SqlitePool::connect(":memory:").await.unwrap();
    ofertafit_common::db::init_tables(&db).await.unwrap();

    let mut config = AppConfig::default();
    config.sync.secret = secret.map(|s| s.to_string());
    // No scheduled items in these tests; keep the loop snappy anyway
    config.sync.jitter_min_ms = 0;
    config.sync.jitter_max_ms = 0;
    let config = Arc::new(config);

    let orchestrator = Arc::new(SyncOrchestrator::new(
        db.clone(),
        Arc::new(ProviderRegistry::with_defaults()),
        Arc::new(LogNotifier),
        config.sync.clone(),
    ));
    let pipeline = Arc::new(IngestPipeline::new(
        db.clone(),
        CatalogAdmissionGate::with_builtin_rules(),
        config.ingest.clone(),
    ));

    AppState::new(db, orchestrator, pipeline, config)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_reports_module_and_version() {
    let app = build_router(test_state(None).await);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "ofertafit-sync");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_sync_trigger_requires_secret() {
    let app = build_router(test_state(Some("hunter2")).await);

    // No Authorization header
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sync/run")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Wrong secret
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sync/run")
                .header(header::AUTHORIZATION, "Bearer wrong")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_sync_trigger_with_secret_runs_and_reports() {
    let app = build_router(test_state(Some("hunter2")).await);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sync/run")
                .header(header::AUTHORIZATION, "Bearer hunter2")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"skip_notifications": true}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    // Empty database: the run completes over zero eligible items
    assert_eq!(body["result"], "completed");
    assert_eq!(body["eligible"], 0);
    assert_eq!(body["processed"], 0);
}

#[tokio::test]
async fn test_unguarded_deployment_accepts_bare_trigger() {
    let app = build_router(test_state(None).await);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sync/run")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_run_listing_returns_persisted_runs() {
    let state = test_state(None).await;
    let app = build_router(state.clone());

    // Two triggered runs, then list them
    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/sync/run")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(
            Request::builder()
                .uri("/sync/runs?limit=10")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let runs = body.as_array().unwrap();
    assert_eq!(runs.len(), 2);
    assert!(runs[0]["finished_at"].is_string());
}

#[tokio::test]
async fn test_ingest_round_trip() {
    let state = test_state(Some("hunter2")).await;
    let app = build_router(state.clone());

    let request_body = json!({
        "category": "suplementos",
        "candidates": [
            {
                "external_id": "MLB100",
                "title": "Whey Protein Concentrado 1kg",
                "brand": "Growth",
                "price": 119.9,
                "category_id": "MLB264586"
            },
            {
                "external_id": "MLB101",
                "title": "Racao premium para caes",
                "brand": "PetBrand",
                "price": 89.9,
                "category_id": "MLB264586"
            }
        ]
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/ingest/run")
                .header(header::AUTHORIZATION, "Bearer hunter2")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(request_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["received"], 2);
    assert_eq!(body["published"], 1);
    assert_eq!(body["rejected"], 1);

    // The published candidate is now tracked for the price sync
    let tracked: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tracked_items")
        .fetch_one(&state.db)
        .await
        .unwrap();
    assert_eq!(tracked, 1);
}

#[tokio::test]
async fn test_ingest_unknown_category_is_bad_request() {
    let app = build_router(test_state(None).await);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/ingest/run")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"category": "eletronicos", "candidates": []}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
