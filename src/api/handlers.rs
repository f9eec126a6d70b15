//! API Handlers
//!
//! HTTP request handlers for the readiness and cache administration endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::info;

use crate::cache::Cache;
use crate::error::{CacheError, Result};
use crate::models::{
    HealthResponse, InvalidateRequest, InvalidateResponse, StatsResponse, TtlOverrideRequest,
    TtlOverrideResponse,
};

/// Application state shared across all handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    pub cache: Cache,
}

impl AppState {
    pub fn new(cache: Cache) -> Self {
        Self { cache }
    }
}

async fn require_enabled(cache: &Cache) -> Result<()> {
    if cache.is_enabled().await {
        Ok(())
    } else {
        Err(CacheError::Unavailable(format!(
            "cache is {}",
            cache.status().await.as_str()
        )))
    }
}

/// Handler for GET /health
///
/// Always answers 200; the `cache` field carries the store readiness.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::from_status(state.cache.status().await))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.cache.stats()))
}

/// Handler for POST /cache/invalidate
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }
    require_enabled(&state.cache).await?;

    let removed = state.cache.invalidate(&req.pattern).await;
    Ok(Json(InvalidateResponse::new(req.pattern, removed)))
}

/// Handler for DELETE /cache/tags/:tag
pub async fn invalidate_tag_handler(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> Result<Json<InvalidateResponse>> {
    require_enabled(&state.cache).await?;

    let removed = state.cache.invalidate_by_tag(&tag).await;
    Ok(Json(InvalidateResponse::new(tag, removed)))
}

/// Handler for PUT /cache/ttl
///
/// Overrides take effect for writes made after the call.
pub async fn ttl_override_handler(
    State(state): State<AppState>,
    Json(req): Json<TtlOverrideRequest>,
) -> Result<Json<TtlOverrideResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    state.cache.set_ttl_override(req.prefix.clone(), req.seconds);
    info!(prefix = %req.prefix, seconds = req.seconds, "TTL override updated");

    Ok(Json(TtlOverrideResponse::new(
        req.prefix,
        req.seconds,
        state.cache.ttl_overrides(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    use crate::cache::CacheStatus;
    use crate::config::Config;
    use crate::store::MemoryStore;

    async fn connected_state() -> AppState {
        let cache = Cache::builder(Config::default())
            .adapter(Arc::new(MemoryStore::new(100)))
            .connect()
            .await;
        AppState::new(cache)
    }

    #[tokio::test]
    async fn test_health_handler_reports_cache_status() {
        let response = health_handler(State(AppState::new(Cache::disabled()))).await;
        assert_eq!(response.status, "healthy");
        assert_eq!(response.cache, CacheStatus::NotConfigured);
    }

    #[tokio::test]
    async fn test_invalidate_handler() {
        let state = connected_state().await;
        state.cache.set("posts:list:1", &json!([1, 2]), None).await;

        let req = InvalidateRequest {
            pattern: "posts:*".to_string(),
        };
        let response = invalidate_handler(State(state.clone()), Json(req)).await.unwrap();
        assert_eq!(response.removed, 1);
        assert_eq!(state.cache.get("posts:list:1").await, None);
    }

    #[tokio::test]
    async fn test_invalidate_handler_when_disabled() {
        let state = AppState::new(Cache::disabled());
        let req = InvalidateRequest {
            pattern: "posts:*".to_string(),
        };
        let result = invalidate_handler(State(state), Json(req)).await;
        assert!(matches!(result, Err(CacheError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_invalidate_handler_rejects_empty_pattern() {
        let state = connected_state().await;
        let req = InvalidateRequest {
            pattern: String::new(),
        };
        let result = invalidate_handler(State(state), Json(req)).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_ttl_override_handler() {
        let state = connected_state().await;
        let req = TtlOverrideRequest {
            prefix: "comments:list".to_string(),
            seconds: 120,
        };
        let response = ttl_override_handler(State(state.clone()), Json(req)).await.unwrap();
        assert_eq!(response.overrides.len(), 1);
        assert_eq!(state.cache.resolve_ttl("comments:list:42", None), 120);
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let state = connected_state().await;
        state.cache.get("missing").await;

        let response = stats_handler(State(state)).await;
        assert_eq!(response.stats.misses, 1);
        assert_eq!(response.hit_rate, 0.0);
    }
}
