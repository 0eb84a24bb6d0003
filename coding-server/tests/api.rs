//! HTTP surface over an in-memory store

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use coding_server::ServerState;
use coding_server::core::build_app;
use coding_server::core::config::Config;
use common::{fast_pipeline, orchestrator, printer_settings, store_with_codes};
use serde_json::{Value, json};
use tower::ServiceExt;

fn state() -> ServerState {
    let orchestrator = orchestrator(store_with_codes(20), "127.0.0.1:1");
    let config = Config {
        database_url: "postgres://unused".to_string(),
        database_max_connections: 1,
        http_port: 0,
        log_level: "info".to_string(),
        log_json: false,
        log_dir: None,
        printer: printer_settings("127.0.0.1:1"),
        pipeline: fast_pipeline(),
    };
    ServerState::new(config, orchestrator)
}

async fn call(
    app: axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(body) => Body::from(body.to_string()),
            None => Body::empty(),
        })
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn batch_body(quantity_target: i64) -> Value {
    json!({
        "batch_no": "B-API-1",
        "product_id": 1,
        "quantity_target": quantity_target,
        "printer_line_id": 1,
        "marking_printer_id": 1,
        "user_id": 3
    })
}

#[tokio::test]
async fn test_health_and_idle_status() {
    let app = build_app(state());

    let (status, body) = call(app.clone(), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["is_printing"], false);

    let (status, body) = call(app, "GET", "/api/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["batch_id"].is_null());
    assert_eq!(body["connection"], "closed");
}

#[tokio::test]
async fn test_invalid_batch_names_the_field() {
    let app = build_app(state());

    let (status, body) = call(app, "POST", "/api/batches", Some(batch_body(0))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["field"], "quantity_target");
}

#[tokio::test]
async fn test_batch_lifecycle_over_http() {
    let app = build_app(state());

    let (status, _) = call(app.clone(), "POST", "/api/print/start", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(app.clone(), "POST", "/api/batches", Some(batch_body(30))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"]["requested"], 30);

    let (status, body) = call(app.clone(), "POST", "/api/batches", Some(batch_body(5))).await;
    assert_eq!(status, StatusCode::OK);
    let batch_id = body["id"].as_i64().unwrap();

    let (status, _) = call(app.clone(), "POST", "/api/batches", Some(batch_body(5))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = call(app.clone(), "GET", "/api/batches", None).await;
    assert_eq!(body["batch_no"], "B-API-1");

    let (status, _) = call(
        app.clone(),
        "POST",
        "/api/batches/stop",
        Some(json!({ "batch_id": batch_id, "user_id": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = call(app, "GET", "/api/batches", None).await;
    assert!(body.is_null());
}
