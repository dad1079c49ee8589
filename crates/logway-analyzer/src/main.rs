/// Stub analyzer service for demos and end-to-end testing.
///
/// Speaks the two endpoints the gateway dispatches to (`POST /analyze`,
/// `GET /health`) and adds a small control surface so a running stub
/// can be flipped between behaviors without a restart:
///
///   PUT /mode {"mode": "ok" | "error" | "reject" | "flaky" | "slow"}
///
///   ok      accept everything with 200
///   error   500 on analyze and health (degrades in the gateway)
///   reject  422 on analyze (message refused, health unaffected)
///   flaky   alternate 200 / 500 per analyze call
///   slow    200 after a 2s delay (trips the gateway send timeout)

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use logway_protocol::message::LogMessage;

#[derive(Parser, Debug)]
#[command(name = "logway-analyzer", about = "Stub log analyzer")]
struct Args {
    /// Listen address
    #[arg(short, long, env = "ANALYZER_LISTEN", default_value = "0.0.0.0:9000")]
    listen: String,

    /// Initial behavior mode
    #[arg(short, long, env = "ANALYZER_MODE", default_value = "ok")]
    mode: Mode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Mode {
    Ok,
    Error,
    Reject,
    Flaky,
    Slow,
}

struct StubState {
    start_time: Instant,
    mode: RwLock<Mode>,
    received: AtomicU64,
    refused: AtomicU64,
    failed: AtomicU64,
    health_checks: AtomicU64,
}

impl StubState {
    fn new(mode: Mode) -> Arc<Self> {
        Arc::new(Self {
            start_time: Instant::now(),
            mode: RwLock::new(mode),
            received: AtomicU64::new(0),
            refused: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            health_checks: AtomicU64::new(0),
        })
    }

    fn mode(&self) -> Mode {
        *self.mode.read().unwrap()
    }
}

async fn analyze(State(state): State<Arc<StubState>>, Json(message): Json<LogMessage>) -> Response {
    let n = state.received.fetch_add(1, Ordering::Relaxed);
    let mode = state.mode();

    let effective = match mode {
        Mode::Flaky if n % 2 == 1 => Mode::Error,
        Mode::Flaky => Mode::Ok,
        other => other,
    };

    match effective {
        Mode::Ok => (
            StatusCode::OK,
            Json(json!({
                "accepted": true,
                "level": message.level,
                "source": message.source,
            })),
        )
            .into_response(),
        Mode::Reject => {
            state.refused.fetch_add(1, Ordering::Relaxed);
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": "message refused" })),
            )
                .into_response()
        }
        Mode::Slow => {
            tokio::time::sleep(Duration::from_secs(2)).await;
            (StatusCode::OK, Json(json!({ "accepted": true }))).into_response()
        }
        Mode::Error | Mode::Flaky => {
            state.failed.fetch_add(1, Ordering::Relaxed);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "analyzer exploded" })),
            )
                .into_response()
        }
    }
}

async fn health(State(state): State<Arc<StubState>>) -> Response {
    state.health_checks.fetch_add(1, Ordering::Relaxed);
    match state.mode() {
        Mode::Error => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "status": "failing" })),
        )
            .into_response(),
        _ => (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response(),
    }
}

async fn stats(State(state): State<Arc<StubState>>) -> Response {
    Json(json!({
        "mode": state.mode(),
        "uptimeSeconds": state.start_time.elapsed().as_secs(),
        "received": state.received.load(Ordering::Relaxed),
        "refused": state.refused.load(Ordering::Relaxed),
        "failed": state.failed.load(Ordering::Relaxed),
        "healthChecks": state.health_checks.load(Ordering::Relaxed),
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
struct ModeRequest {
    mode: Mode,
}

async fn set_mode(State(state): State<Arc<StubState>>, Json(req): Json<ModeRequest>) -> Response {
    *state.mode.write().unwrap() = req.mode;
    info!(mode = ?req.mode, "Behavior mode switched");
    Json(json!({ "success": true, "mode": req.mode })).into_response()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let state = StubState::new(args.mode);

    let app = Router::new()
        .route("/analyze", post(analyze))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/mode", put(set_mode))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    info!(addr = %args.listen, mode = ?args.mode, "Stub analyzer listening");
    axum::serve(listener, app).await?;

    Ok(())
}
