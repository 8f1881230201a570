//! Router assembly.

use crate::handlers::{batch, convert, extract, health, jobs};
use crate::middleware::request_scope;
use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Request-body caps for the JSON surfaces.
const EXTRACT_BODY_LIMIT: usize = 64 * 1024;
const BATCH_BODY_LIMIT: usize = 128 * 1024;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(convert::root))
        .route("/health", get(health::health))
        .route("/metrics", get(health::metrics))
        .route(
            "/extract",
            post(extract::extract).layer(DefaultBodyLimit::max(EXTRACT_BODY_LIMIT)),
        )
        .route(
            "/batch",
            post(batch::batch).layer(DefaultBodyLimit::max(BATCH_BODY_LIMIT)),
        )
        .route("/async", post(jobs::submit))
        .route("/job/:id", get(jobs::poll))
        .route("/*target", get(convert::target))
        .layer(axum::middleware::from_fn(request_scope))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .with_state(state)
}
