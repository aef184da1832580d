//! DLQ monitor entrypoint (C10).

use anyhow::{Context, Result};
use server::AppState;
use submission_queue::{DlqMonitor, DlqMonitorConfig};
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

    let state = AppState::build("dlq-monitor").await.context("failed to build app state")?;

    if state.config.alert_webhook_url.is_none() {
        tracing::warn!("ALERT_WEBHOOK_URL not set, DLQ alerts will be logged only");
    }

    let config = DlqMonitorConfig {
        dlq_url: state.config.dlq_url.clone(),
        alert_threshold: state.config.dlq_alert_threshold,
        check_interval_sec: state.config.dlq_check_interval_sec,
        alert_webhook_url: state.config.alert_webhook_url.clone(),
    };

    let monitor = DlqMonitor::new(state.transport.clone(), config);
    monitor.run().await;
}
