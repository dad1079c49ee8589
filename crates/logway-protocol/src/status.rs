/// Status snapshot types shared by the gateway's reporting endpoints
/// and the loadtest soak poller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time view of one pool member, as served by `/analyzers`
/// and embedded in `/stats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerSnapshot {
    pub id: String,
    pub endpoint: String,
    pub weight: f64,
    pub healthy: bool,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
    pub total_checks: u64,
    pub total_failures: u64,
    /// Failures observed on the dispatch path (5xx, timeout, connect).
    pub dispatch_failures: u64,
    /// Failures observed by the active prober.
    pub probe_failures: u64,
    /// 4xx responses; message errors, not health strikes.
    pub rejected_messages: u64,
    pub last_response_time_ms: u64,
    pub last_seen: Option<DateTime<Utc>>,
}

/// Aggregate gateway counters served by `/stats`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStats {
    pub uptime_seconds: u64,
    pub packets_received: u64,
    pub packets_processed: u64,
    pub packets_dropped: u64,
    pub errors: u64,
    /// Best-effort composite of two counters; not read atomically.
    pub avg_latency_ms: f64,
    pub queue_size: usize,
    pub healthy_analyzers: usize,
    pub analyzers: Vec<AnalyzerSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_serializes_camel_case() {
        let snap = AnalyzerSnapshot {
            id: "a1".to_string(),
            endpoint: "http://x:1".to_string(),
            weight: 1.0,
            healthy: true,
            consecutive_successes: 2,
            consecutive_failures: 0,
            total_checks: 5,
            total_failures: 1,
            dispatch_failures: 1,
            probe_failures: 0,
            rejected_messages: 0,
            last_response_time_ms: 12,
            last_seen: None,
        };
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["consecutiveSuccesses"], 2);
        assert_eq!(json["dispatchFailures"], 1);
        assert_eq!(json["lastResponseTimeMs"], 12);
    }
}
