/// Shared gateway state, cloned into every handler and task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use logway_protocol::status::GatewayStats;

use crate::config::GatewayConfig;
use crate::events::EventBus;
use crate::metrics::GatewayMetrics;
use crate::queue::DispatchQueue;
use crate::registry::AnalyzerRegistry;

#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    pub start_time: Instant,
    pub config: GatewayConfig,
    pub registry: AnalyzerRegistry,
    pub queue: DispatchQueue,
    pub metrics: GatewayMetrics,
    pub events: EventBus,
    /// One pooled client for dispatches and probes alike; per-request
    /// timeouts are set at the call site.
    pub http: reqwest::Client,
    packet_seq: AtomicU64,
}

impl AppState {
    pub fn new(config: GatewayConfig) -> anyhow::Result<Self> {
        let events = EventBus::new();
        let registry = AnalyzerRegistry::new(
            config.failure_threshold,
            config.success_threshold,
            events.clone(),
        );
        let queue = DispatchQueue::new(config.max_queue_size);
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .pool_max_idle_per_host(32)
            .build()?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                start_time: Instant::now(),
                config,
                registry,
                queue,
                metrics: GatewayMetrics::new(),
                events,
                http,
                packet_seq: AtomicU64::new(0),
            }),
        })
    }

    /// Process-unique id for packets submitted without one.
    pub fn next_packet_id(&self) -> String {
        let seq = self.inner.packet_seq.fetch_add(1, Ordering::Relaxed) + 1;
        format!("pkt-{seq}")
    }

    pub fn uptime_secs(&self) -> u64 {
        self.inner.start_time.elapsed().as_secs()
    }

    pub async fn stats(&self) -> GatewayStats {
        let analyzers = self.inner.registry.snapshot().await;
        let healthy_analyzers = analyzers.iter().filter(|a| a.healthy).count();
        let metrics = &self.inner.metrics;
        GatewayStats {
            uptime_seconds: self.uptime_secs(),
            packets_received: metrics.packets_received.load(Ordering::Relaxed),
            packets_processed: metrics.packets_processed.load(Ordering::Relaxed),
            packets_dropped: metrics.packets_dropped.load(Ordering::Relaxed),
            errors: metrics.errors.load(Ordering::Relaxed),
            avg_latency_ms: metrics.avg_latency_ms(),
            queue_size: self.inner.queue.len(),
            healthy_analyzers,
            analyzers,
        }
    }
}
