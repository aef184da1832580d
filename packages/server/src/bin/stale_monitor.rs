//! Stale-job monitor entrypoint (C9).

use anyhow::{Context, Result};
use server::AppState;
use submission_queue::{StaleJobMonitor, StaleMonitorConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server=debug,submission_queue=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let state = AppState::build("stale-job-monitor").await.context("failed to build app state")?;

    let config = StaleMonitorConfig {
        queue_url: state.config.queue_url.clone(),
        threshold_minutes: state.config.stale_threshold_min,
        check_interval_sec: state.config.stale_check_interval_sec,
    };

    let monitor = StaleJobMonitor::new(state.transport.clone(), state.dao.clone(), config);
    monitor.run().await;
}
