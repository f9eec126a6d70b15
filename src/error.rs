//! Error types for the cache facade
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Store Error Enum ==
/// Faults raised by a backing store adapter.
///
/// These never cross the facade boundary: the facade logs them and degrades
/// to miss / no-op behavior.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Error reported by the Redis client
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Operation did not complete within the configured timeout
    #[error("Operation timed out after {0} ms")]
    Timeout(u64),

    /// Adapter does not implement the requested operation
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    /// Any other backend failure
    #[error("Backend error: {0}")]
    Backend(String),
}

// == Codec Error Enum ==
/// Failures while encoding or decoding stored payloads.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Compression error: {0}")]
    Compression(#[from] std::io::Error),

    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Payload is not valid UTF-8")]
    Utf8,

    #[error("Unknown payload discriminator: {0}")]
    Discriminator(String),
}

// == Cache Error Enum ==
/// Error type for the administrative HTTP surface.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Caching is disabled or the backing store failed to initialize
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            CacheError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            CacheError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            CacheError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

// == Result Type Aliases ==
/// Convenience Result type for the HTTP surface.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Result type returned by backing store adapters.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_maps_to_503() {
        let response = CacheError::Unavailable("no store".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_invalid_request_maps_to_400() {
        let response = CacheError::InvalidRequest("bad".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Unsupported("scan");
        assert_eq!(err.to_string(), "Unsupported operation: scan");
        assert_eq!(StoreError::Timeout(250).to_string(), "Operation timed out after 250 ms");
    }
}
