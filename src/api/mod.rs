//! API Module
//!
//! HTTP handlers and routing for the cache admin API.
//!
//! # Endpoints
//! - `GET /health` - Health check with cache readiness
//! - `GET /stats` - Cache statistics
//! - `POST /cache/invalidate` - Pattern invalidation
//! - `DELETE /cache/tags/:tag` - Tag invalidation
//! - `PUT /cache/ttl` - TTL prefix override

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
