use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::{routing, Json, Router};
use bytes::Bytes;
use config::ServerConfig;
use context::{Envelope, QueryResult, SpanStore, TraceLookup, TracePage, TraceQuery, WriteOutcome};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::Result;
use crate::ingest::decode_request;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SpanStore>,
    pub max_body_bytes: usize,
}

/// Body of `POST /api/query`
#[derive(Debug, Deserialize)]
pub struct AdhocRequest {
    pub query: String,
}

/// Create the HTTP router for ingestion, trace queries, health and metrics
pub fn create_router(store: Arc<SpanStore>, config: &ServerConfig) -> Router {
    let state = AppState {
        store,
        max_body_bytes: config.max_body_bytes,
    };

    Router::new()
        .route("/v1/traces", routing::post(ingest_handler))
        .route("/api/traces", routing::get(list_traces_handler))
        .route("/api/traces/:trace_id", routing::get(trace_detail_handler))
        .route("/api/query", routing::post(adhoc_query_handler))
        .route("/health", routing::get(health_handler))
        .route("/metrics", routing::get(metrics_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::CONTENT_ENCODING])
}

/// Handler for POST /v1/traces
///
/// Storage failures are absorbed by the writer; a well-formed payload is
/// always acknowledged with an empty partial success.
#[tracing::instrument(skip_all, fields(bytes = body.len()))]
async fn ingest_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let request = decode_request(&headers, body, state.max_body_bytes)?;

    match state.store.ingest(&request).await {
        WriteOutcome::Written { rows, .. } => tracing::info!(rows, "Ingested spans"),
        WriteOutcome::Dropped { rows, .. } => tracing::warn!(rows, "Ingested spans were dropped"),
        WriteOutcome::Skipped => tracing::debug!("Empty ingestion payload"),
    }

    Ok(Json(json!({ "partialSuccess": {} })))
}

/// Handler for GET /api/traces
#[tracing::instrument(skip(state))]
async fn list_traces_handler(
    State(state): State<AppState>,
    Query(query): Query<TraceQuery>,
) -> Json<Envelope<TracePage>> {
    Json(state.store.search_traces(&query).await.into())
}

/// Handler for GET /api/traces/:trace_id
#[tracing::instrument(skip(state))]
async fn trace_detail_handler(
    State(state): State<AppState>,
    Path(trace_id): Path<String>,
) -> Json<Envelope<TraceLookup>> {
    Json(state.store.trace_detail(&trace_id).await.into())
}

/// Handler for POST /api/query
#[tracing::instrument(skip_all)]
async fn adhoc_query_handler(
    State(state): State<AppState>,
    Json(request): Json<AdhocRequest>,
) -> Json<Envelope<QueryResult>> {
    Json(state.store.execute_adhoc(&request.query).await.into())
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Handler for GET /metrics
/// Returns Prometheus metrics in text format
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    let metric_families = state.store.metrics().registry().gather();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        buffer,
    )
        .into_response()
}
