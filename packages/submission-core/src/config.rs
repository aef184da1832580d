//! Environment configuration, loaded once at process start.
//!
//! Follows the `std::env::var(...).context(...)` / `unwrap_or_else` style
//! used in `packages/server/src/bin/server.rs` rather than a config crate —
//! server config is loaded the same way, by hand, at the top of `main`.

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub queue_url: String,
    pub dlq_url: String,
    pub queue_visibility_sec: u64,
    pub queue_batch: i32,
    pub queue_wait_sec: i32,
    pub queue_max_errors: u32,
    pub dlq_retry_threshold: u32,
    pub dlq_alert_threshold: u32,
    pub dlq_check_interval_sec: u64,
    pub stale_threshold_min: i64,
    pub stale_check_interval_sec: u64,
    pub planner_url: String,
    pub planner_timeout_sec: u64,
    pub alert_webhook_url: Option<String>,
    pub max_concurrent_directories: usize,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            queue_url: std::env::var("QUEUE_URL").context("QUEUE_URL must be set")?,
            dlq_url: std::env::var("DLQ_URL").context("DLQ_URL must be set")?,
            queue_visibility_sec: env_parse_or("QUEUE_VISIBILITY_SEC", 600),
            queue_batch: env_parse_or("QUEUE_BATCH", 5),
            queue_wait_sec: env_parse_or("QUEUE_WAIT_SEC", 20),
            queue_max_errors: env_parse_or("QUEUE_MAX_ERRORS", 10),
            dlq_retry_threshold: env_parse_or("DLQ_RETRY_THRESHOLD", 3),
            dlq_alert_threshold: env_parse_or("DLQ_ALERT_THRESHOLD", 1),
            dlq_check_interval_sec: env_parse_or("DLQ_CHECK_INTERVAL_SEC", 300),
            stale_threshold_min: env_parse_or("STALE_THRESHOLD_MIN", 10),
            stale_check_interval_sec: env_parse_or("STALE_CHECK_INTERVAL_SEC", 120),
            planner_url: env_or("PLANNER_URL", "http://localhost:8090"),
            planner_timeout_sec: env_parse_or("PLANNER_TIMEOUT_SEC", 30),
            alert_webhook_url: std::env::var("ALERT_WEBHOOK_URL").ok(),
            max_concurrent_directories: env_parse_or("MAX_CONCURRENT_DIRECTORIES", 10),
        })
    }
}
