/// Pool administration: admit, evict, list, and manual probes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use logway_protocol::analyzer::AnalyzerSpec;

use crate::prober;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AdmitRequest {
    pub id: String,
    pub endpoint: String,
    #[serde(default)]
    pub weight: Option<f64>,
}

pub async fn list_analyzers(State(state): State<AppState>) -> Response {
    let analyzers = state.inner.registry.snapshot().await;
    Json(json!({ "analyzers": analyzers })).into_response()
}

pub async fn admit_analyzer(
    State(state): State<AppState>,
    Json(req): Json<AdmitRequest>,
) -> Response {
    let spec = match AnalyzerSpec::new(&req.id, &req.endpoint, req.weight.unwrap_or(1.0)) {
        Ok(spec) => spec,
        Err(err) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response();
        }
    };

    let entry = state.inner.registry.admit(spec).await;
    let snapshot = state
        .inner
        .registry
        .snapshot()
        .await
        .into_iter()
        .find(|a| a.id == entry.spec().id);
    Json(json!({ "success": true, "analyzer": snapshot })).into_response()
}

/// Idempotent: evicting an unknown id is not an error.
pub async fn evict_analyzer(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let removed = state.inner.registry.evict(&id).await;
    Json(json!({ "success": true, "removed": removed })).into_response()
}

pub async fn trigger_probe(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match prober::probe_one(&state, &id).await {
        Some(success) => {
            let snapshot = state
                .inner
                .registry
                .snapshot()
                .await
                .into_iter()
                .find(|a| a.id == id);
            Json(json!({ "id": id, "success": success, "analyzer": snapshot })).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("unknown analyzer `{id}`") })),
        )
            .into_response(),
    }
}
