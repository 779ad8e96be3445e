use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use config::{Config, ServerConfig};
use context::open_store;
use http_body_util::BodyExt;
use object_store::local::LocalFileSystem;
use serde_json::{json, Value};
use std::sync::Arc;
use tests::{memory_store, payload_path};
use tower::ServiceExt;
use tracestore_server::create_router;

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

fn ingest_request(file: &str) -> Request<Body> {
    let body = std::fs::read(payload_path(file)).unwrap();
    Request::builder()
        .method("POST")
        .uri("/v1/traces")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_http_checkout_scenario() {
    let router = create_router(Arc::new(memory_store().unwrap()), &ServerConfig::default());

    let (status, body) = send(&router, ingest_request("checkout.json")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"partialSuccess": {}}));

    let (_, body) = send(&router, get("/api/traces?service=checkout&limit=10")).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(
        body["pagination"],
        json!({"offset": 0, "limit": 10, "total": 1, "has_next": false, "has_prev": false})
    );
    assert_eq!(body["traces"][0]["span_count"], json!(2));

    let (_, body) = send(&router, get("/api/traces/5b8efff798038103d269b633813fc60c")).await;
    assert_eq!(body["operation_name"], json!("POST /pay"));
    assert_eq!(body["spans"][0]["span_id"], json!("aaaaaaaaaaaaaaaa"));
    assert_eq!(body["spans"][1]["span_id"], json!("bbbbbbbbbbbbbbbb"));
    assert_eq!(body["spans"][1]["start_time"], json!("2023-11-14T22:13:20.010Z"));
}

#[tokio::test]
async fn test_http_ingest_acknowledged_when_storage_fails() {
    let file = std::env::temp_dir().join(format!("tracestore-http-not-a-dir-{}", std::process::id()));
    std::fs::write(&file, b"x").unwrap();
    let store = open_store(
        &Config::in_memory(),
        Arc::new(LocalFileSystem::new_with_prefix(&file).unwrap()),
    )
    .unwrap();
    let router = create_router(Arc::new(store), &ServerConfig::default());

    let (status, body) = send(&router, ingest_request("checkout.json")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"partialSuccess": {}}));

    std::fs::remove_file(&file).unwrap();
}

#[tokio::test]
async fn test_http_body_limit() {
    let config = ServerConfig {
        max_body_bytes: 64,
        ..ServerConfig::default()
    };
    let router = create_router(Arc::new(memory_store().unwrap()), &config);

    let (status, _) = send(&router, ingest_request("checkout.json")).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}
