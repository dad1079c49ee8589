/// Process-wide aggregate counters, incremented on the hot path.
///
/// Writers use relaxed atomic arithmetic; readers may observe
/// non-atomic composites (the average latency pairs two counters), so
/// derived values are best-effort.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct GatewayMetrics {
    pub packets_received: AtomicU64,
    pub packets_processed: AtomicU64,
    pub packets_dropped: AtomicU64,
    pub errors: AtomicU64,
    pub total_latency_ms: AtomicU64,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self, count: u64) {
        self.packets_dropped.fetch_add(count, Ordering::Relaxed);
    }

    /// A packet is processed once every message in it was attempted,
    /// regardless of individual message outcomes.
    pub fn record_processed(&self, latency_ms: u64) {
        self.packets_processed.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn avg_latency_ms(&self) -> f64 {
        let processed = self.packets_processed.load(Ordering::Relaxed);
        if processed == 0 {
            return 0.0;
        }
        self.total_latency_ms.load(Ordering::Relaxed) as f64 / processed as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avg_latency_over_processed_packets() {
        let metrics = GatewayMetrics::new();
        assert_eq!(metrics.avg_latency_ms(), 0.0);

        metrics.record_processed(10);
        metrics.record_processed(30);
        assert_eq!(metrics.avg_latency_ms(), 20.0);
    }

    #[test]
    fn counters_accumulate() {
        let metrics = GatewayMetrics::new();
        metrics.record_received();
        metrics.record_received();
        metrics.record_dropped(3);
        metrics.record_error();
        assert_eq!(metrics.packets_received.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.packets_dropped.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.errors.load(Ordering::Relaxed), 1);
    }
}
