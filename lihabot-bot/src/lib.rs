pub mod config;
mod error;
pub mod helpers;
pub mod render;
mod routes;
pub mod validation;

use axum::{Router, http::StatusCode, routing::get};
use lihabot_core::TankQueue;
use std::sync::Arc;
use std::time::Duration;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub use error::{AppError, ErrorResponse};

pub struct AppState {
    pub queue: TankQueue,
}

/// Rate limiting configuration for the status endpoints
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests per second
    pub per_sec: u64,
    /// Burst size
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_sec: 10,
            burst: 20,
        }
    }
}

/// Create the read-only status router. Nothing reachable here mutates state.
pub fn create_app(
    queue: TankQueue,
    request_timeout: Duration,
    rate_limit: RateLimitConfig,
) -> Router {
    let state = Arc::new(AppState { queue });

    let governor = GovernorConfigBuilder::default()
        .per_second(rate_limit.per_sec.max(1))
        .burst_size(rate_limit.burst.max(1))
        .key_extractor(SmartIpKeyExtractor)
        .finish()
        .expect("rate limit values are clamped to non-zero");

    let status_routes = Router::new()
        .route("/status", get(routes::status))
        .route("/queue", get(routes::shared_length))
        .route("/queue/{tank}", get(routes::tank_length))
        .route("/position/{player_id}", get(routes::position))
        .layer(GovernorLayer::new(governor));

    Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .merge(status_routes)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
