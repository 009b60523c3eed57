/// Local HTTP API - health, prometheus metrics and the cached template
///
/// Everything here reads through a `CacheReader`; nothing can write the cache.

use axum::{extract::State, http::{header, StatusCode}, response::{IntoResponse, Response}, routing::get, Json, Router};
use serde_json::json;
use std::sync::Arc;

use crate::bus::MessageBus;
use crate::metrics::prometheus as metrics;
use crate::relay::CacheReader;

#[derive(Clone)]
pub struct ApiState {
    pub cache: CacheReader,
    pub bus: Arc<dyn MessageBus>,
}

async fn api_health(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let redis_ok = state.bus.ping().await.is_ok();
    Json(json!({
        "status": "ok",
        "redis": redis_ok,
        "template": state.cache.is_populated(),
    }))
}

async fn api_metrics() -> impl IntoResponse {
    let body = metrics::render();
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

async fn api_template(State(state): State<ApiState>) -> Response {
    match state.cache.get() {
        Some(template) => Json(template.as_ref().clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "no block template fetched yet"})),
        )
            .into_response(),
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(api_health))
        .route("/metrics", get(api_metrics))
        .route("/template", get(api_template))
        .with_state(state)
}

/// Serve the API on `listen` until the task is aborted
pub async fn serve(listen: String, state: ApiState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(&listen).await?;
    tracing::info!("Bridge API listening on {}", listen);
    axum::serve(listener, router(state)).await
}
