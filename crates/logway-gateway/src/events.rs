/// Typed gateway event stream.
///
/// Registry transitions and dispatch errors are published on a
/// broadcast channel; interested subsystems subscribe. Sends are
/// best-effort: with no subscribers the event is simply discarded.

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum GatewayEvent {
    Admitted {
        id: String,
    },
    Evicted {
        id: String,
    },
    /// Healthy → unhealthy, after the failure threshold was reached.
    Degraded {
        id: String,
        consecutive_failures: u32,
    },
    /// Unhealthy → healthy, after the success threshold was reached.
    Recovered {
        id: String,
        consecutive_successes: u32,
    },
    /// A single message could not be delivered. The owning packet
    /// still completes.
    MessageError {
        packet_id: String,
        analyzer: Option<String>,
        detail: String,
    },
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<GatewayEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn emit(&self, event: GatewayEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Mirror the event stream into structured logs. Spawned once at
/// startup; exits on cancellation.
pub async fn log_events(bus: EventBus, cancel: CancellationToken) {
    let mut rx = bus.subscribe();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = rx.recv() => match event {
                Ok(GatewayEvent::Admitted { id }) => {
                    info!(analyzer = %id, "Analyzer admitted");
                }
                Ok(GatewayEvent::Evicted { id }) => {
                    info!(analyzer = %id, "Analyzer evicted");
                }
                Ok(GatewayEvent::Degraded { id, consecutive_failures }) => {
                    warn!(analyzer = %id, consecutive_failures, "Analyzer degraded");
                }
                Ok(GatewayEvent::Recovered { id, consecutive_successes }) => {
                    info!(analyzer = %id, consecutive_successes, "Analyzer recovered");
                }
                Ok(GatewayEvent::MessageError { packet_id, analyzer, detail }) => {
                    debug!(packet = %packet_id, analyzer = ?analyzer, detail = %detail, "Message dispatch error");
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "Event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}
