//! HTTP Server & Routing Integration Tests
//!
//! Drives the router with `tower::ServiceExt::oneshot` against fake
//! analyzers; no network or external tools involved.

mod helpers;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use emofuse_ai::{build_router, AppState};
use emofuse_common::events::EventBus;
use helpers::{distribution, single, Behavior, FakeAcquirer, Scenario};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app_for(scenario: &Scenario) -> (Router, AppState) {
    let event_bus = EventBus::new(100);
    let orchestrator = scenario.orchestrator().with_event_bus(event_bus.clone());
    let state = AppState::new(Arc::new(orchestrator), event_bus);
    (build_router(state.clone()), state)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_reports_version_and_analyzers() {
    let scenario = Scenario::worked_example();
    let (app, _) = app_for(&scenario);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "emofuse-ai");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(json["analyzers"]["text"], "fake");
    assert!(json["uptime_seconds"].is_u64());
    assert!(json.get("last_error").is_none());
}

#[tokio::test]
async fn test_analyze_returns_fused_report() {
    let scenario = Scenario::worked_example();
    let (app, _) = app_for(&scenario);

    let response = app
        .oneshot(post_json(
            "/analyze",
            json!({ "youtube_url": "https://youtu.be/dQw4w9WgXcQ" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["final_emotion"], "happy");
    assert_eq!(json["confidence"], 72.9);
    assert_eq!(json["source"]["source_id"], "dQw4w9WgXcQ");
    assert!(json["analysis_id"].is_string());

    let total: f64 = json["all_scores"]
        .as_object()
        .unwrap()
        .values()
        .map(|v| v.as_f64().unwrap())
        .sum();
    assert!((total - 100.0).abs() <= 0.2);

    assert_eq!(json["per_modality"].as_array().unwrap().len(), 3);
    assert_eq!(json["per_modality"][2]["failure"]["kind"], "analyzer");
}

#[tokio::test]
async fn test_analyze_with_weight_override() {
    let scenario = Scenario::new(
        FakeAcquirer::ok(),
        single("happy", 1.0),
        single("sad", 1.0),
        distribution(&[("Sad", 1.0)]),
    );
    let (app, _) = app_for(&scenario);

    let response = app
        .oneshot(post_json(
            "/analyze",
            json!({
                "youtube_url": "https://youtu.be/dQw4w9WgXcQ",
                "weights": { "text": 1.0, "video": 0.0, "audio": 0.0 }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["final_emotion"], "happy");
}

#[tokio::test]
async fn test_invalid_weights_rejected() {
    let scenario = Scenario::worked_example();
    let (app, _) = app_for(&scenario);

    let response = app
        .oneshot(post_json(
            "/analyze",
            json!({
                "youtube_url": "https://youtu.be/dQw4w9WgXcQ",
                "weights": { "text": 0.9, "video": 0.9, "audio": 0.9 }
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "BAD_REQUEST");
    assert_eq!(scenario.acquirer.calls(), 0, "rejected before acquisition");
}

#[tokio::test]
async fn test_missing_or_empty_url_rejected() {
    let scenario = Scenario::worked_example();
    let (app, _) = app_for(&scenario);

    let empty = app
        .clone()
        .oneshot(post_json("/analyze", json!({ "youtube_url": "   " })))
        .await
        .unwrap();
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let missing = app.oneshot(post_json("/analyze", json!({}))).await.unwrap();
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(missing).await["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_fatal_input_maps_to_bad_gateway() {
    let scenario = Scenario::new(
        FakeAcquirer::failing("video unavailable"),
        single("happy", 0.9),
        single("happy", 0.9),
        single("happy", 0.9),
    );
    let (app, state) = app_for(&scenario);

    let response = app
        .clone()
        .oneshot(post_json("/analyze", json!({ "youtube_url": "https://youtu.be/dQw4w9WgXcQ" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "INPUT_UNAVAILABLE");
    assert!(json["error"]["message"].as_str().unwrap().contains("video unavailable"));

    // Surfaces in /health afterwards
    assert!(state.last_error.read().await.is_some());
    let health = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let health = body_json(health).await;
    assert!(health["last_error"].as_str().unwrap().contains("video unavailable"));
}

#[tokio::test]
async fn test_all_failed_maps_to_unprocessable() {
    let scenario = Scenario::new(
        FakeAcquirer::ok(),
        Behavior::Fail("quota".to_string()),
        Behavior::Fail("no faces".to_string()),
        Behavior::Fail("silence".to_string()),
    );
    let (app, _) = app_for(&scenario);

    let response = app
        .oneshot(post_json("/analyze", json!({ "youtube_url": "https://youtu.be/dQw4w9WgXcQ" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "INSUFFICIENT_MODALITIES");
    assert_eq!(json["error"]["failures"].as_array().unwrap().len(), 3);
    assert_eq!(json["error"]["failures"][1]["message"], "no faces");
}

#[tokio::test]
async fn test_analyze_text_endpoint() {
    let scenario = Scenario::worked_example();
    let (app, _) = app_for(&scenario);

    let response = app
        .clone()
        .oneshot(post_json("/analyze-text", json!({ "text": "such a happy time" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["modality"], "text");
    assert_eq!(json["primary"], "happy");
    assert!((json["scores"]["happy"].as_f64().unwrap() - 0.9).abs() < 1e-9);

    let blank = app
        .oneshot(post_json("/analyze-text", json!({ "text": "" })))
        .await
        .unwrap();
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_analyze_text_failure_is_unprocessable() {
    let scenario = Scenario::new(
        FakeAcquirer::ok(),
        Behavior::Fail("text too short for analysis".to_string()),
        single("happy", 0.9),
        single("happy", 0.9),
    );
    let (app, _) = app_for(&scenario);

    let response = app
        .oneshot(post_json("/analyze-text", json!({ "text": "meh" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["error"]["code"], "MODALITY_FAILED");
}

#[tokio::test]
async fn test_events_endpoint_is_sse() {
    let scenario = Scenario::worked_example();
    let (app, _) = app_for(&scenario);

    let response = app
        .oneshot(Request::builder().uri("/events").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
    assert!(content_type.to_str().unwrap().starts_with("text/event-stream"));
}

#[tokio::test]
async fn test_cors_headers_present() {
    let scenario = Scenario::worked_example();
    let (app, _) = app_for(&scenario);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(header::ORIGIN, "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}
