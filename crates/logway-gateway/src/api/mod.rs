pub mod admin;
pub mod ingest;
pub mod status;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Ingress
        .route("/logs", post(ingest::submit_logs))
        // Gateway status
        .route("/health", get(status::health))
        .route("/ready", get(status::ready))
        .route("/stats", get(status::stats))
        // Pool administration
        .route(
            "/analyzers",
            get(admin::list_analyzers).post(admin::admit_analyzer),
        )
        .route("/analyzers/:id", delete(admin::evict_analyzer))
        .route("/analyzers/:id/health", post(admin::trigger_probe))
        .with_state(state)
}
