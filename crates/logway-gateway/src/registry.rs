/// Analyzer registry and outcome recorder.
///
/// The registry owns the mutable pool: admit, evict, lookup, and
/// consistent snapshots for selection and reporting. It is also the
/// single writer of per-analyzer health state: every dispatch and
/// probe outcome flows through `record_outcome`, which drives the
/// 3-strikes healthy↔unhealthy state machine.
///
/// Locking is two-level: the id→entry map sits under an async RwLock
/// (many readers, few writers), while each entry guards its own
/// counters with a short-lived std Mutex so independent analyzers
/// update in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use logway_protocol::analyzer::AnalyzerSpec;
use logway_protocol::status::AnalyzerSnapshot;

use crate::events::{EventBus, GatewayEvent};

/// Where an outcome was observed. Both sources feed the same state
/// machine; failures are tallied separately for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeSource {
    Dispatch,
    Probe,
}

#[derive(Debug)]
struct AnalyzerHealth {
    healthy: bool,
    consecutive_successes: u32,
    consecutive_failures: u32,
    total_checks: u64,
    total_failures: u64,
    dispatch_failures: u64,
    probe_failures: u64,
    rejected_messages: u64,
    last_response_time_ms: u64,
    last_seen: Option<DateTime<Utc>>,
}

impl AnalyzerHealth {
    /// Admit is trusted: a fresh record starts healthy with zeroed
    /// counters, no probationary successes required.
    fn fresh() -> Self {
        Self {
            healthy: true,
            consecutive_successes: 0,
            consecutive_failures: 0,
            total_checks: 0,
            total_failures: 0,
            dispatch_failures: 0,
            probe_failures: 0,
            rejected_messages: 0,
            last_response_time_ms: 0,
            last_seen: None,
        }
    }
}

/// Health transition produced by one recorded outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Degraded,
    Recovered,
}

/// One live pool member. The spec fields are immutable for the
/// lifetime of the entry; a replacement admit installs a new entry.
pub struct AnalyzerEntry {
    spec: AnalyzerSpec,
    health: Mutex<AnalyzerHealth>,
}

impl AnalyzerEntry {
    pub fn spec(&self) -> &AnalyzerSpec {
        &self.spec
    }

    pub fn is_healthy(&self) -> bool {
        self.health.lock().unwrap().healthy
    }

    fn snapshot(&self) -> AnalyzerSnapshot {
        let health = self.health.lock().unwrap();
        AnalyzerSnapshot {
            id: self.spec.id.clone(),
            endpoint: self.spec.endpoint.clone(),
            weight: self.spec.weight,
            healthy: health.healthy,
            consecutive_successes: health.consecutive_successes,
            consecutive_failures: health.consecutive_failures,
            total_checks: health.total_checks,
            total_failures: health.total_failures,
            dispatch_failures: health.dispatch_failures,
            probe_failures: health.probe_failures,
            rejected_messages: health.rejected_messages,
            last_response_time_ms: health.last_response_time_ms,
            last_seen: health.last_seen,
        }
    }
}

pub struct AnalyzerRegistry {
    analyzers: RwLock<HashMap<String, Arc<AnalyzerEntry>>>,
    failure_threshold: u32,
    success_threshold: u32,
    events: EventBus,
}

impl AnalyzerRegistry {
    pub fn new(failure_threshold: u32, success_threshold: u32, events: EventBus) -> Self {
        Self {
            analyzers: RwLock::new(HashMap::new()),
            failure_threshold,
            success_threshold,
            events,
        }
    }

    /// Install or replace a pool member. Replacing an existing id
    /// resets its health state, equivalent to evict-then-admit.
    /// The spec is validated at construction, so admit cannot fail.
    pub async fn admit(&self, spec: AnalyzerSpec) -> Arc<AnalyzerEntry> {
        let id = spec.id.clone();
        let entry = Arc::new(AnalyzerEntry {
            spec,
            health: Mutex::new(AnalyzerHealth::fresh()),
        });
        self.analyzers.write().await.insert(id.clone(), entry.clone());
        self.events.emit(GatewayEvent::Admitted { id });
        entry
    }

    /// Remove a pool member. Idempotent; returns whether a record was
    /// actually removed.
    pub async fn evict(&self, id: &str) -> bool {
        let removed = self.analyzers.write().await.remove(id).is_some();
        if removed {
            self.events.emit(GatewayEvent::Evicted { id: id.to_string() });
        }
        removed
    }

    pub async fn lookup(&self, id: &str) -> Option<Arc<AnalyzerEntry>> {
        self.analyzers.read().await.get(id).cloned()
    }

    /// Live entries, id-sorted. Used by the prober sweep.
    pub async fn entries(&self) -> Vec<Arc<AnalyzerEntry>> {
        let mut entries: Vec<Arc<AnalyzerEntry>> =
            self.analyzers.read().await.values().cloned().collect();
        entries.sort_by(|a, b| a.spec.id.cmp(&b.spec.id));
        entries
    }

    /// Point-in-time copy of every record, id-sorted so that selection
    /// iterates in a stable order. Each record is internally
    /// consistent: its fields are copied under the entry lock.
    pub async fn snapshot(&self) -> Vec<AnalyzerSnapshot> {
        let entries = self.entries().await;
        entries.iter().map(|e| e.snapshot()).collect()
    }

    pub async fn healthy_count(&self) -> usize {
        self.analyzers
            .read()
            .await
            .values()
            .filter(|e| e.is_healthy())
            .count()
    }

    pub async fn len(&self) -> usize {
        self.analyzers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.analyzers.read().await.is_empty()
    }

    /// Record a dispatch or probe outcome against the entry it was
    /// observed on. Outcomes for entries that were evicted or replaced
    /// mid-flight are dropped without side effect.
    pub async fn record_outcome(
        &self,
        entry: &Arc<AnalyzerEntry>,
        source: OutcomeSource,
        success: bool,
        rtt_ms: u64,
    ) {
        if !self.is_current(entry).await {
            return;
        }
        let (transition, successes, failures) = {
            let mut health = entry.health.lock().unwrap();
            let transition = self.apply(&mut health, source, success, rtt_ms);
            (transition, health.consecutive_successes, health.consecutive_failures)
        };
        self.emit_transition(&entry.spec.id, transition, successes, failures);
    }

    /// Record a downstream 4xx: the analyzer answered, so this counts
    /// as a liveness success, but the message itself was refused.
    pub async fn record_rejected(&self, entry: &Arc<AnalyzerEntry>, rtt_ms: u64) {
        if !self.is_current(entry).await {
            return;
        }
        let (transition, successes, failures) = {
            let mut health = entry.health.lock().unwrap();
            health.rejected_messages += 1;
            let transition = self.apply(&mut health, OutcomeSource::Dispatch, true, rtt_ms);
            (transition, health.consecutive_successes, health.consecutive_failures)
        };
        self.emit_transition(&entry.spec.id, transition, successes, failures);
    }

    async fn is_current(&self, entry: &Arc<AnalyzerEntry>) -> bool {
        match self.analyzers.read().await.get(&entry.spec.id) {
            Some(current) => Arc::ptr_eq(current, entry),
            None => false,
        }
    }

    fn apply(
        &self,
        health: &mut AnalyzerHealth,
        source: OutcomeSource,
        success: bool,
        rtt_ms: u64,
    ) -> Option<Transition> {
        health.total_checks += 1;
        health.last_response_time_ms = rtt_ms;

        if success {
            health.consecutive_successes += 1;
            health.consecutive_failures = 0;
            health.last_seen = Some(Utc::now());
        } else {
            health.total_failures += 1;
            match source {
                OutcomeSource::Dispatch => health.dispatch_failures += 1,
                OutcomeSource::Probe => health.probe_failures += 1,
            }
            health.consecutive_failures += 1;
            health.consecutive_successes = 0;
        }

        if !health.healthy && health.consecutive_successes >= self.success_threshold {
            health.healthy = true;
            return Some(Transition::Recovered);
        }
        if health.healthy && health.consecutive_failures >= self.failure_threshold {
            health.healthy = false;
            return Some(Transition::Degraded);
        }
        None
    }

    fn emit_transition(
        &self,
        id: &str,
        transition: Option<Transition>,
        successes: u32,
        failures: u32,
    ) {
        let Some(transition) = transition else { return };
        match transition {
            Transition::Degraded => self.events.emit(GatewayEvent::Degraded {
                id: id.to_string(),
                consecutive_failures: failures,
            }),
            Transition::Recovered => self.events.emit(GatewayEvent::Recovered {
                id: id.to_string(),
                consecutive_successes: successes,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logway_protocol::{DEFAULT_FAILURE_THRESHOLD, DEFAULT_SUCCESS_THRESHOLD};

    fn registry() -> AnalyzerRegistry {
        AnalyzerRegistry::new(
            DEFAULT_FAILURE_THRESHOLD,
            DEFAULT_SUCCESS_THRESHOLD,
            EventBus::new(),
        )
    }

    fn spec(id: &str, weight: f64) -> AnalyzerSpec {
        AnalyzerSpec::new(id, &format!("http://{id}:9000"), weight).unwrap()
    }

    #[tokio::test]
    async fn admit_starts_healthy() {
        let reg = registry();
        let entry = reg.admit(spec("a1", 1.0)).await;
        assert!(entry.is_healthy());

        let snap = reg.snapshot().await;
        assert_eq!(snap.len(), 1);
        assert!(snap[0].healthy);
        assert_eq!(snap[0].total_checks, 0);
    }

    #[tokio::test]
    async fn evict_is_idempotent() {
        let reg = registry();
        reg.admit(spec("a1", 1.0)).await;
        assert!(reg.evict("a1").await);
        assert!(!reg.evict("a1").await);
        assert!(reg.is_empty().await);
    }

    #[tokio::test]
    async fn readmit_replaces_and_resets_counters() {
        let reg = registry();
        let old = reg.admit(spec("a1", 1.0)).await;
        reg.record_outcome(&old, OutcomeSource::Dispatch, false, 5).await;
        reg.record_outcome(&old, OutcomeSource::Dispatch, false, 5).await;

        let fresh = reg.admit(spec("a1", 2.0)).await;
        let snap = reg.snapshot().await;
        assert_eq!(snap[0].weight, 2.0);
        assert_eq!(snap[0].total_checks, 0);
        assert_eq!(snap[0].consecutive_failures, 0);
        assert!(snap[0].healthy);
        assert!(fresh.is_healthy());
    }

    #[tokio::test]
    async fn three_failures_degrade_three_successes_recover() {
        let reg = registry();
        let mut rx = reg.events.subscribe();
        let entry = reg.admit(spec("a1", 1.0)).await;

        for _ in 0..2 {
            reg.record_outcome(&entry, OutcomeSource::Dispatch, false, 10).await;
            assert!(entry.is_healthy());
        }
        reg.record_outcome(&entry, OutcomeSource::Probe, false, 10).await;
        assert!(!entry.is_healthy());

        for _ in 0..2 {
            reg.record_outcome(&entry, OutcomeSource::Probe, true, 10).await;
            assert!(!entry.is_healthy());
        }
        reg.record_outcome(&entry, OutcomeSource::Dispatch, true, 10).await;
        assert!(entry.is_healthy());

        // Admitted, then the two transitions.
        assert!(matches!(rx.try_recv(), Ok(GatewayEvent::Admitted { .. })));
        assert!(matches!(rx.try_recv(), Ok(GatewayEvent::Degraded { id, consecutive_failures: 3 }) if id == "a1"));
        assert!(matches!(rx.try_recv(), Ok(GatewayEvent::Recovered { id, consecutive_successes: 3 }) if id == "a1"));
    }

    #[tokio::test]
    async fn consecutive_counters_are_mutually_exclusive() {
        let reg = registry();
        let entry = reg.admit(spec("a1", 1.0)).await;

        let outcomes = [true, true, false, true, false, false, true];
        for success in outcomes {
            reg.record_outcome(&entry, OutcomeSource::Dispatch, success, 1).await;
            let snap = reg.snapshot().await;
            assert!(
                snap[0].consecutive_successes == 0 || snap[0].consecutive_failures == 0,
                "both streak counters nonzero"
            );
            assert!(snap[0].total_failures <= snap[0].total_checks);
        }
    }

    #[tokio::test]
    async fn failure_sources_are_tallied_separately() {
        let reg = registry();
        let entry = reg.admit(spec("a1", 1.0)).await;
        reg.record_outcome(&entry, OutcomeSource::Dispatch, false, 1).await;
        reg.record_outcome(&entry, OutcomeSource::Probe, false, 1).await;
        reg.record_outcome(&entry, OutcomeSource::Probe, false, 1).await;

        let snap = reg.snapshot().await;
        assert_eq!(snap[0].total_failures, 3);
        assert_eq!(snap[0].dispatch_failures, 1);
        assert_eq!(snap[0].probe_failures, 2);
        // Sum of sources drives the shared state machine.
        assert!(!snap[0].healthy);
    }

    #[tokio::test]
    async fn outcome_after_eviction_is_dropped() {
        let reg = registry();
        let entry = reg.admit(spec("a1", 1.0)).await;
        reg.evict("a1").await;
        reg.record_outcome(&entry, OutcomeSource::Dispatch, false, 1).await;

        // No record left to observe; the detached entry is untouched.
        assert!(reg.snapshot().await.is_empty());
        assert_eq!(entry.snapshot().total_checks, 0);
    }

    #[tokio::test]
    async fn outcome_after_replacement_is_dropped() {
        let reg = registry();
        let old = reg.admit(spec("a1", 1.0)).await;
        reg.admit(spec("a1", 1.0)).await;
        reg.record_outcome(&old, OutcomeSource::Dispatch, false, 1).await;

        let snap = reg.snapshot().await;
        assert_eq!(snap[0].total_checks, 0);
    }

    #[tokio::test]
    async fn rejected_counts_as_liveness_success() {
        let reg = registry();
        let entry = reg.admit(spec("a1", 1.0)).await;
        reg.record_outcome(&entry, OutcomeSource::Dispatch, false, 1).await;
        reg.record_rejected(&entry, 2).await;

        let snap = reg.snapshot().await;
        assert_eq!(snap[0].rejected_messages, 1);
        assert_eq!(snap[0].consecutive_failures, 0);
        assert_eq!(snap[0].consecutive_successes, 1);
        assert!(snap[0].last_seen.is_some());
        assert!(snap[0].healthy);
    }

    #[tokio::test]
    async fn snapshot_is_id_sorted() {
        let reg = registry();
        reg.admit(spec("charlie", 1.0)).await;
        reg.admit(spec("alpha", 1.0)).await;
        reg.admit(spec("bravo", 1.0)).await;

        let ids: Vec<String> = reg.snapshot().await.into_iter().map(|s| s.id).collect();
        assert_eq!(ids, ["alpha", "bravo", "charlie"]);
    }
}
