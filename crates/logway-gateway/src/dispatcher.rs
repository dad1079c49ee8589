/// Dispatch workers.
///
/// Each worker loops on queue-signal, periodic tick, or cancellation,
/// drains a bounded batch, and fans the messages of every drained
/// packet out concurrently: select a healthy analyzer, POST the
/// message to its `/analyze` endpoint, record the outcome. A failing
/// message never aborts its packet, and a failing packet never aborts
/// the worker loop.

use std::time::Instant;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use logway_protocol::message::LogMessage;

use crate::events::GatewayEvent;
use crate::queue::QueuedPacket;
use crate::registry::OutcomeSource;
use crate::selector;
use crate::state::AppState;

/// Outcome of one delivery attempt.
enum Delivery {
    Delivered,
    /// Downstream said 4xx; the message is refused, the analyzer is
    /// alive, and re-routing would not help.
    Refused { analyzer: String, status: u16 },
    /// 5xx, timeout, or connection failure; eligible for one re-route
    /// when retry is enabled.
    Failed { analyzer: String, detail: String },
    /// Nothing selectable.
    NoAnalyzer { detail: String },
}

pub async fn run(state: AppState, worker_id: usize, cancel: CancellationToken) {
    let mut tick = tokio::time::interval(state.inner.config.processing_interval);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!(worker = worker_id, "Dispatch worker started");

    loop {
        tokio::select! {
            _ = state.inner.queue.notified() => {}
            _ = tick.tick() => {}
            _ = cancel.cancelled() => break,
        }

        loop {
            let batch = state.inner.queue.drain_batch(state.inner.config.batch_size);
            if batch.is_empty() {
                break;
            }
            for packet in batch {
                process_packet(&state, packet).await;
            }
        }
    }

    info!(worker = worker_id, "Dispatch worker stopped");
}

/// Attempt every message of the packet, then account the packet as
/// processed. Message failures surface as error counters and events,
/// never as early exit.
async fn process_packet(state: &AppState, packet: QueuedPacket) {
    let QueuedPacket {
        packet_id,
        agent_id,
        messages,
        enqueued_at,
    } = packet;

    let message_count = messages.len();
    let mut tasks = JoinSet::new();
    for message in messages {
        let state = state.clone();
        let packet_id = packet_id.clone();
        tasks.spawn(async move {
            dispatch_message(&state, &packet_id, message).await;
        });
    }
    while let Some(result) = tasks.join_next().await {
        if let Err(err) = result {
            // A panicking dispatch task is a bug, but the packet and
            // the worker loop must survive it.
            warn!(packet = %packet_id, error = %err, "Dispatch task failed");
            state.inner.metrics.record_error();
        }
    }

    let latency_ms = enqueued_at.elapsed().as_millis() as u64;
    state.inner.metrics.record_processed(latency_ms);
    debug!(
        packet = %packet_id,
        agent = ?agent_id,
        messages = message_count,
        latency_ms,
        "Packet processed"
    );
}

async fn dispatch_message(state: &AppState, packet_id: &str, message: LogMessage) {
    let first = deliver(state, &message, None).await;

    let failure = match first {
        Delivery::Delivered => return,
        Delivery::Failed { analyzer, detail } if state.inner.config.retry_on_failure => {
            match deliver(state, &message, Some(&analyzer)).await {
                Delivery::Delivered => return,
                retried => describe(retried),
            }
        }
        other => describe(other),
    };

    let (analyzer, detail) = failure;
    state.inner.metrics.record_error();
    state.inner.events.emit(GatewayEvent::MessageError {
        packet_id: packet_id.to_string(),
        analyzer,
        detail,
    });
}

fn describe(delivery: Delivery) -> (Option<String>, String) {
    match delivery {
        Delivery::Delivered => (None, String::new()),
        Delivery::Refused { analyzer, status } => {
            let detail = format!("analyzer refused message with status {status}");
            (Some(analyzer), detail)
        }
        Delivery::Failed { analyzer, detail } => (Some(analyzer), detail),
        Delivery::NoAnalyzer { detail } => (None, detail),
    }
}

/// One select-send-record round. `exclude` skips the analyzer a prior
/// attempt failed on.
async fn deliver(state: &AppState, message: &LogMessage, exclude: Option<&str>) -> Delivery {
    let snapshot = state.inner.registry.snapshot().await;
    let picked = {
        let mut rng = rand::thread_rng();
        selector::pick_excluding(&snapshot, exclude, &mut rng).map(|a| a.id.clone())
    };
    let analyzer_id = match picked {
        Ok(id) => id,
        Err(err) => {
            return Delivery::NoAnalyzer {
                detail: err.to_string(),
            }
        }
    };

    // The analyzer may vanish between snapshot and lookup.
    let Some(entry) = state.inner.registry.lookup(&analyzer_id).await else {
        return Delivery::NoAnalyzer {
            detail: format!("analyzer {analyzer_id} was evicted before send"),
        };
    };

    let started = Instant::now();
    let response = state
        .inner
        .http
        .post(entry.spec().analyze_url())
        .timeout(state.inner.config.send_timeout)
        .json(message)
        .send()
        .await;
    let rtt_ms = started.elapsed().as_millis() as u64;

    match response {
        Ok(resp) if resp.status().is_success() => {
            state
                .inner
                .registry
                .record_outcome(&entry, OutcomeSource::Dispatch, true, rtt_ms)
                .await;
            Delivery::Delivered
        }
        Ok(resp) if resp.status().is_client_error() => {
            state.inner.registry.record_rejected(&entry, rtt_ms).await;
            Delivery::Refused {
                analyzer: analyzer_id,
                status: resp.status().as_u16(),
            }
        }
        Ok(resp) => {
            state
                .inner
                .registry
                .record_outcome(&entry, OutcomeSource::Dispatch, false, rtt_ms)
                .await;
            Delivery::Failed {
                analyzer: analyzer_id,
                detail: format!("analyzer returned status {}", resp.status()),
            }
        }
        Err(err) => {
            state
                .inner
                .registry
                .record_outcome(&entry, OutcomeSource::Dispatch, false, rtt_ms)
                .await;
            Delivery::Failed {
                analyzer: analyzer_id,
                detail: err.to_string(),
            }
        }
    }
}
