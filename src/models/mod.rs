//! Request and Response models for the cache admin API
//!
//! DTOs used for serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{InvalidateRequest, TtlOverrideRequest};
pub use responses::{
    ErrorResponse, HealthResponse, InvalidateResponse, StatsResponse, TtlOverride, TtlOverrideResponse,
};
