pub mod analyzer;
pub mod message;
pub mod status;

/// Dispatch path appended to an analyzer's base endpoint
pub const DISPATCH_PATH: &str = "/analyze";
/// Probe path appended to an analyzer's base endpoint
pub const PROBE_PATH: &str = "/health";

/// Default ingress port
pub const DEFAULT_PORT: u16 = 8080;

/// Queue and dispatch defaults
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 10_000;
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_PROCESSING_INTERVAL_MS: u64 = 10;
pub const DEFAULT_SEND_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_WORKERS: usize = 1;

/// Health-check defaults
pub const DEFAULT_HEALTH_CHECK_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_HEALTH_CHECK_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
pub const DEFAULT_SUCCESS_THRESHOLD: u32 = 3;

/// Shutdown drain grace period
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 10_000;
