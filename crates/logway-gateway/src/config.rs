/// Gateway configuration.
///
/// Every tuning knob is settable by flag or environment variable. The
/// analyzer pool can come from two places: an optional TOML file with
/// `[[analyzers]]` entries and the `ANALYZERS` environment variable
/// (comma-separated `id:endpoint:weight` triples). Environment entries
/// win when both declare the same id.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;

use logway_protocol::analyzer::AnalyzerSpec;
use logway_protocol::{
    DEFAULT_BATCH_SIZE, DEFAULT_FAILURE_THRESHOLD, DEFAULT_HEALTH_CHECK_INTERVAL_MS,
    DEFAULT_HEALTH_CHECK_TIMEOUT_MS, DEFAULT_MAX_QUEUE_SIZE, DEFAULT_PORT,
    DEFAULT_PROCESSING_INTERVAL_MS, DEFAULT_SEND_TIMEOUT_MS, DEFAULT_SHUTDOWN_GRACE_MS,
    DEFAULT_SUCCESS_THRESHOLD, DEFAULT_WORKERS,
};

#[derive(Parser, Debug, Clone)]
#[command(name = "logway-gateway", about = "Log ingestion and dispatch gateway")]
pub struct Args {
    /// Ingress port
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Queue capacity; enqueues beyond it are rejected with 429
    #[arg(long, env = "MAX_QUEUE_SIZE", default_value_t = DEFAULT_MAX_QUEUE_SIZE)]
    pub max_queue_size: usize,

    /// Max packets a worker drains per wakeup
    #[arg(long, env = "BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Worker fallback tick in milliseconds
    #[arg(long, env = "PROCESSING_INTERVAL", default_value_t = DEFAULT_PROCESSING_INTERVAL_MS)]
    pub processing_interval_ms: u64,

    /// Probe sweep period in milliseconds
    #[arg(long, env = "HEALTH_CHECK_INTERVAL", default_value_t = DEFAULT_HEALTH_CHECK_INTERVAL_MS)]
    pub health_check_interval_ms: u64,

    /// Per-probe timeout in milliseconds
    #[arg(long, env = "HEALTH_CHECK_TIMEOUT", default_value_t = DEFAULT_HEALTH_CHECK_TIMEOUT_MS)]
    pub health_check_timeout_ms: u64,

    /// Per-dispatch timeout in milliseconds
    #[arg(long, env = "SEND_TIMEOUT", default_value_t = DEFAULT_SEND_TIMEOUT_MS)]
    pub send_timeout_ms: u64,

    /// Consecutive failures before an analyzer is marked unhealthy
    #[arg(long, env = "FAILURE_THRESHOLD", default_value_t = DEFAULT_FAILURE_THRESHOLD)]
    pub failure_threshold: u32,

    /// Consecutive successes before an unhealthy analyzer recovers
    #[arg(long, env = "SUCCESS_THRESHOLD", default_value_t = DEFAULT_SUCCESS_THRESHOLD)]
    pub success_threshold: u32,

    /// Number of dispatch worker loops
    #[arg(long, env = "WORKERS", default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Re-route a failed message once to a different analyzer
    #[arg(long, env = "RETRY_ON_FAILURE")]
    pub retry_on_failure: bool,

    /// Drain grace period at shutdown in milliseconds
    #[arg(long, env = "SHUTDOWN_GRACE", default_value_t = DEFAULT_SHUTDOWN_GRACE_MS)]
    pub shutdown_grace_ms: u64,

    /// Comma-separated id:endpoint:weight triples
    #[arg(long, env = "ANALYZERS")]
    pub analyzers: Option<String>,

    /// Path to an optional TOML pool file
    #[arg(short, long, env = "LOGWAY_CONFIG", default_value = "logway.toml")]
    pub config: PathBuf,
}

/// `[[analyzers]]` entries of the TOML pool file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PoolFile {
    #[serde(default)]
    pub analyzers: Vec<AnalyzerSpec>,
}

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub port: u16,
    pub max_queue_size: usize,
    pub batch_size: usize,
    pub processing_interval: Duration,
    pub health_check_interval: Duration,
    pub probe_timeout: Duration,
    pub send_timeout: Duration,
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub workers: usize,
    pub retry_on_failure: bool,
    pub shutdown_grace: Duration,
    pub pool: Vec<AnalyzerSpec>,
}

impl GatewayConfig {
    /// Merge args with the optional pool file contents. Entries from
    /// the file are validated the same way admin admits are.
    pub fn resolve(args: &Args, pool_file: Option<&str>) -> anyhow::Result<Self> {
        let mut pool: Vec<AnalyzerSpec> = Vec::new();

        if let Some(text) = pool_file {
            let file: PoolFile = toml::from_str(text).context("malformed pool file")?;
            for raw in file.analyzers {
                let spec = AnalyzerSpec::new(&raw.id, &raw.endpoint, raw.weight)
                    .with_context(|| format!("invalid pool file entry `{}`", raw.id))?;
                merge_entry(&mut pool, spec);
            }
        }

        if let Some(triples) = args.analyzers.as_deref() {
            for spec in AnalyzerSpec::parse_pool(triples).context("invalid ANALYZERS value")? {
                merge_entry(&mut pool, spec);
            }
        }

        Ok(Self {
            port: args.port,
            max_queue_size: args.max_queue_size,
            batch_size: args.batch_size.max(1),
            processing_interval: Duration::from_millis(args.processing_interval_ms.max(1)),
            health_check_interval: Duration::from_millis(args.health_check_interval_ms.max(1)),
            probe_timeout: Duration::from_millis(args.health_check_timeout_ms.max(1)),
            send_timeout: Duration::from_millis(args.send_timeout_ms.max(1)),
            failure_threshold: args.failure_threshold.max(1),
            success_threshold: args.success_threshold.max(1),
            workers: args.workers.max(1),
            retry_on_failure: args.retry_on_failure,
            shutdown_grace: Duration::from_millis(args.shutdown_grace_ms),
            pool,
        })
    }
}

/// Last declaration of an id wins, preserving first-seen order
/// otherwise.
fn merge_entry(pool: &mut Vec<AnalyzerSpec>, spec: AnalyzerSpec) {
    match pool.iter_mut().find(|existing| existing.id == spec.id) {
        Some(existing) => *existing = spec,
        None => pool.push(spec),
    }
}
