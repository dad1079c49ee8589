/// Active health prober.
///
/// Sweeps the registry on a fixed period and GETs every analyzer's
/// `/health` endpoint concurrently. Probe outcomes feed the same state
/// machine as dispatch outcomes, so a quiet pool still degrades and
/// recovers.

use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::registry::{AnalyzerEntry, OutcomeSource};
use crate::state::AppState;

pub async fn run(state: AppState, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(state.inner.config.health_check_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!(
        interval_ms = state.inner.config.health_check_interval.as_millis() as u64,
        "Health prober started"
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = cancel.cancelled() => break,
        }
        sweep(&state).await;
    }

    info!("Health prober stopped");
}

/// Probe every current pool member concurrently and wait for all
/// outcomes to be recorded.
async fn sweep(state: &AppState) {
    let entries = state.inner.registry.entries().await;
    if entries.is_empty() {
        return;
    }

    let mut probes = JoinSet::new();
    for entry in entries {
        let state = state.clone();
        probes.spawn(async move {
            probe_entry(&state, &entry).await;
        });
    }
    while probes.join_next().await.is_some() {}
}

/// Run one probe and record its outcome. Returns whether the probe
/// succeeded.
pub async fn probe_entry(state: &AppState, entry: &Arc<AnalyzerEntry>) -> bool {
    let started = Instant::now();
    let response = state
        .inner
        .http
        .get(entry.spec().health_url())
        .timeout(state.inner.config.probe_timeout)
        .send()
        .await;
    let rtt_ms = started.elapsed().as_millis() as u64;

    let success = matches!(&response, Ok(resp) if resp.status().is_success());
    debug!(
        analyzer = %entry.spec().id,
        success,
        rtt_ms,
        "Probe completed"
    );

    state
        .inner
        .registry
        .record_outcome(entry, OutcomeSource::Probe, success, rtt_ms)
        .await;
    success
}

/// Manually probe one analyzer and return once its outcome has been
/// recorded. `None` means the id is unknown.
pub async fn probe_one(state: &AppState, id: &str) -> Option<bool> {
    let entry = state.inner.registry.lookup(id).await?;
    Some(probe_entry(state, &entry).await)
}
