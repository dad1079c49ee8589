use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use logway_gateway::config::{Args, GatewayConfig};
use logway_gateway::state::AppState;
use logway_gateway::{api, dispatcher, events, prober};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let pool_file = if args.config.exists() {
        info!(path = %args.config.display(), "Loading pool file");
        Some(tokio::fs::read_to_string(&args.config).await?)
    } else {
        info!(path = %args.config.display(), "No pool file found, using flags and environment only");
        None
    };

    let config = GatewayConfig::resolve(&args, pool_file.as_deref())?;
    let state = AppState::new(config.clone())?;

    for spec in &config.pool {
        state.inner.registry.admit(spec.clone()).await;
    }
    info!(
        analyzers = config.pool.len(),
        workers = config.workers,
        max_queue_size = config.max_queue_size,
        "Logway gateway starting"
    );

    let cancel = CancellationToken::new();

    // Event → log mirror
    tokio::spawn(events::log_events(
        state.inner.events.clone(),
        cancel.clone(),
    ));

    // Dispatch workers
    let mut worker_handles = Vec::with_capacity(config.workers);
    for worker_id in 0..config.workers {
        let state = state.clone();
        let cancel = cancel.clone();
        worker_handles.push(tokio::spawn(dispatcher::run(state, worker_id, cancel)));
    }

    // Health prober
    let prober_handle = {
        let state = state.clone();
        let cancel = cancel.clone();
        tokio::spawn(prober::run(state, cancel))
    };

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!(port = config.port, "Gateway listening");

    axum::serve(listener, api::build_router(state.clone()))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    info!("Shutting down...");

    // Stop accepting, then give the workers a bounded grace period to
    // drain what was already accepted.
    state.inner.queue.close();
    let drained = tokio::time::timeout(config.shutdown_grace, async {
        while !state.inner.queue.is_empty() {
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    })
    .await;
    if drained.is_err() {
        warn!(
            remaining = state.inner.queue.len(),
            "Drain grace expired with packets still queued"
        );
    }

    cancel.cancel();
    for handle in worker_handles {
        if tokio::time::timeout(Duration::from_secs(2), handle).await.is_err() {
            warn!("Dispatch worker did not stop in time");
        }
    }
    prober_handle.abort();

    // Whatever survived the grace period was never attempted.
    let leftover = state.inner.queue.drain_remaining();
    if !leftover.is_empty() {
        state.inner.metrics.record_dropped(leftover.len() as u64);
        warn!(dropped = leftover.len(), "Dropped queued packets at shutdown");
    }

    info!("Gateway stopped");
    Ok(())
}
