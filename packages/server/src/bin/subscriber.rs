//! Queue subscriber entrypoint (C8).

use anyhow::{Context, Result};
use server::AppState;
use submission_queue::{Subscriber, SubscriberConfig};
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

    let worker_id = std::env::var("WORKER_ID").unwrap_or_else(|_| format!("subscriber-{}", uuid::Uuid::new_v4()));
    let state = AppState::build(&worker_id).await.context("failed to build app state")?;

    let config = SubscriberConfig {
        queue_url: state.config.queue_url.clone(),
        dlq_url: state.config.dlq_url.clone(),
        visibility_timeout_sec: state.config.queue_visibility_sec as i32,
        batch_size: state.config.queue_batch,
        wait_time_sec: state.config.queue_wait_sec,
        dlq_retry_threshold: state.config.dlq_retry_threshold,
        max_consecutive_errors: state.config.queue_max_errors,
    };

    tracing::info!(worker_id, "starting queue subscriber");

    let subscriber = Subscriber::new(state.transport.clone(), state.dao.clone(), state.flow_deps.clone(), config);
    subscriber.run().await;

    tracing::error!("subscriber loop exited, process should be restarted by its supervisor");
    Ok(())
}
