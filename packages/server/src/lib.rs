//! HTTP API and process wiring for the submission pipeline's four
//! entrypoints: the queue subscriber, the stale-job monitor, the DLQ
//! monitor, and this API server.

pub mod app_state;
pub mod auth;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub use app_state::AppState;

/// Builds the axum router: `/health` is open, `/api/jobs/enqueue` requires
/// a bearer token. Route-specific middleware is layered first, then the
/// cross-cutting layers (CORS, tracing, timeout).
pub fn build_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/api/jobs/enqueue", post(routes::enqueue_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_auth));

    Router::new()
        .route("/health", get(routes::health_handler))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
