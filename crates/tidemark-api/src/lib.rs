//! The Tidemark HTTP gateway: URL-to-Markdown conversion behind an axum
//! surface, with tiered escalation, caching, rate limiting, and async jobs.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod pipeline;
pub mod render;
pub mod routes;
pub mod sanitize;
pub mod state;

pub use config::AppConfig;
pub use routes::router;
pub use state::AppState;
