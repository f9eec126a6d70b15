//! Response DTOs for the cache admin API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::{CacheStats, CacheStatus};

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// "healthy" when the cache is connected or intentionally off,
    /// "degraded" when the store failed to initialize
    pub status: String,
    /// Cache readiness
    pub cache: CacheStatus,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    pub fn from_status(cache: CacheStatus) -> Self {
        let status = match cache {
            CacheStatus::Failed => "degraded",
            CacheStatus::Connected | CacheStatus::NotConfigured => "healthy",
        };
        Self {
            status: status.to_string(),
            cache,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: CacheStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            stats,
        }
    }
}

/// Response body for invalidation endpoints
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    /// Pattern or tag that was invalidated
    pub target: String,
    /// Number of keys removed
    pub removed: usize,
}

impl InvalidateResponse {
    pub fn new(target: impl Into<String>, removed: usize) -> Self {
        Self {
            target: target.into(),
            removed,
        }
    }
}

/// Response body for PUT /cache/ttl
#[derive(Debug, Clone, Serialize)]
pub struct TtlOverrideResponse {
    pub prefix: String,
    pub seconds: u64,
    /// Override table after the update, in match order
    pub overrides: Vec<TtlOverride>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TtlOverride {
    pub prefix: String,
    pub seconds: u64,
}

impl TtlOverrideResponse {
    pub fn new(prefix: impl Into<String>, seconds: u64, overrides: Vec<(String, u64)>) -> Self {
        Self {
            prefix: prefix.into(),
            seconds,
            overrides: overrides
                .into_iter()
                .map(|(prefix, seconds)| TtlOverride { prefix, seconds })
                .collect(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
