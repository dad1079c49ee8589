/// Gateway liveness, readiness, and aggregate stats.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Response {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptimeSeconds": state.uptime_secs(),
    }))
    .into_response()
}

/// Ready iff at least one analyzer can take traffic.
pub async fn ready(State(state): State<AppState>) -> Response {
    let healthy = state.inner.registry.healthy_count().await;
    if healthy > 0 {
        Json(json!({ "ready": true, "healthyAnalyzers": healthy })).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "ready": false, "reason": "no healthy analyzer" })),
        )
            .into_response()
    }
}

pub async fn stats(State(state): State<AppState>) -> Response {
    Json(state.stats().await).into_response()
}
