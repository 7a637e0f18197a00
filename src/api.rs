// src/api.rs
//! Read-only HTTP introspection: liveness, discovered sources, metrics.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;

use crate::coordinator::SourceRegistry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SourceRegistry>,
    pub metrics: Option<PrometheusHandle>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/sources", get(list_sources))
        .route("/metrics", get(render_metrics))
        .with_state(state)
}

#[derive(Debug, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct SourcesResp {
    pub count: usize,
    pub sources: Vec<String>,
}

async fn list_sources(State(state): State<AppState>) -> Json<SourcesResp> {
    let sources: Vec<String> = state
        .registry
        .ids()
        .into_iter()
        .map(|id| id.as_str().to_string())
        .collect();
    Json(SourcesResp {
        count: sources.len(),
        sources,
    })
}

async fn render_metrics(State(state): State<AppState>) -> Result<String, StatusCode> {
    state
        .metrics
        .as_ref()
        .map(|h| h.render())
        .ok_or(StatusCode::NOT_FOUND)
}
