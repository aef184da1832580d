//! HTTP API entrypoint: serves `/health` and `/api/jobs/enqueue`.

use std::sync::Arc;

use anyhow::{Context, Result};
use server::{build_router, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let state = AppState::build("api").await.context("failed to build app state")?;

    sqlx::migrate!("../submission-db/migrations")
        .run(&state.pool)
        .await
        .context("failed to run database migrations")?;

    let router = build_router(Arc::new(state));

    let port: u16 = std::env::var("API_PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .context("invalid API_PORT")?;
    let addr = format!("0.0.0.0:{port}");

    tracing::info!(%addr, "starting submission pipeline API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("failed to bind API server")?;

    axum::serve(listener, router).await.context("API server error")?;

    Ok(())
}
