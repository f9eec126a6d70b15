//! API Routes
//!
//! Configures the Axum router with the readiness and cache admin endpoints.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    health_handler, invalidate_handler, invalidate_tag_handler, stats_handler,
    ttl_override_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Liveness plus cache readiness
/// - `GET /stats` - Cache counters and hit rate
/// - `POST /cache/invalidate` - Delete keys matching a glob pattern
/// - `DELETE /cache/tags/:tag` - Delete keys recorded under a tag
/// - `PUT /cache/ttl` - Add or replace a TTL prefix override
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/cache/invalidate", post(invalidate_handler))
        .route("/cache/tags/:tag", delete(invalidate_tag_handler))
        .route("/cache/ttl", put(ttl_override_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
