//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use cache_facade::{api::create_router, store::MemoryStore, AppState, Cache, Config};
use serde_json::{json, Value};
use tower::ServiceExt;

// == Helper Functions ==

async fn connected_cache() -> Cache {
    Cache::builder(Config::default())
        .adapter(Arc::new(MemoryStore::new(100)))
        .connect()
        .await
}

fn app_for(cache: &Cache) -> Router {
    create_router(AppState::new(cache.clone()))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

// == Health Endpoint Tests ==

#[tokio::test]
async fn test_health_endpoint_not_configured() {
    let app = app_for(&Cache::disabled());

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["cache"], "not_configured");
    assert!(json.get("timestamp").is_some());
}

#[tokio::test]
async fn test_health_endpoint_connected() {
    let cache = connected_cache().await;

    let response = app_for(&cache)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["cache"], "connected");
}

#[tokio::test]
async fn test_health_endpoint_failed_store() {
    let cache = Cache::connect(Config::default().with_redis_url("definitely not a url")).await;

    let response = app_for(&cache)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["cache"], "failed");
}

// == Stats Endpoint Tests ==

#[tokio::test]
async fn test_stats_endpoint() {
    let cache = connected_cache().await;
    cache.set("a", &json!(1), None).await;
    cache.get("a").await;
    cache.get("a").await;
    cache.get("b").await;

    let response = app_for(&cache)
        .oneshot(Request::builder().uri("/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["hits"], 2);
    assert_eq!(json["misses"], 1);
    let hit_rate = json["hit_rate"].as_f64().unwrap();
    assert!((hit_rate - 2.0 / 3.0).abs() < 0.001);
}

// == Invalidation Endpoint Tests ==

#[tokio::test]
async fn test_invalidate_endpoint() {
    let cache = connected_cache().await;
    cache.set("posts:list:1", &json!([1]), None).await;
    cache.set("posts:list:2", &json!([2]), None).await;
    cache.set("users:1", &json!({"id": 1}), None).await;

    let response = app_for(&cache)
        .oneshot(json_request("POST", "/cache/invalidate", r#"{"pattern":"posts:list:*"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["removed"], 2);
    assert_eq!(json["target"], "posts:list:*");

    assert_eq!(cache.get("posts:list:1").await, None);
    assert_eq!(cache.get("users:1").await, Some(json!({"id": 1})));
}

#[tokio::test]
async fn test_invalidate_endpoint_empty_pattern() {
    let cache = connected_cache().await;

    let response = app_for(&cache)
        .oneshot(json_request("POST", "/cache/invalidate", r#"{"pattern":""}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert!(json.get("error").is_some());
}

#[tokio::test]
async fn test_invalidate_endpoint_when_disabled() {
    let response = app_for(&Cache::disabled())
        .oneshot(json_request("POST", "/cache/invalidate", r#"{"pattern":"*"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("not_configured"));
}

#[tokio::test]
async fn test_invalid_json_request() {
    let cache = connected_cache().await;

    let response = app_for(&cache)
        .oneshot(json_request("POST", "/cache/invalidate", "not valid json"))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_tag_endpoint() {
    let cache = connected_cache().await;
    cache.set_with_tags("post:1", &json!("a"), &["posts"], None).await;
    cache.set_with_tags("post:2", &json!("b"), &["posts"], None).await;
    cache.set_with_tags("user:1", &json!("c"), &["users"], None).await;

    let response = app_for(&cache)
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/cache/tags/posts")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["removed"], 2);
    assert_eq!(cache.get("post:1").await, None);
    assert_eq!(cache.get("user:1").await, Some(json!("c")));
}

// == TTL Endpoint Tests ==

#[tokio::test]
async fn test_ttl_override_endpoint() {
    let cache = connected_cache().await;

    let response = app_for(&cache)
        .oneshot(json_request(
            "PUT",
            "/cache/ttl",
            r#"{"prefix":"comments:list","seconds":120}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["overrides"][0]["prefix"], "comments:list");
    assert_eq!(json["overrides"][0]["seconds"], 120);

    assert_eq!(cache.resolve_ttl("comments:list:42", None), 120);
    assert_eq!(cache.resolve_ttl("other:1", None), 300);
}

#[tokio::test]
async fn test_ttl_override_endpoint_empty_prefix() {
    let cache = connected_cache().await;

    let response = app_for(&cache)
        .oneshot(json_request("PUT", "/cache/ttl", r#"{"prefix":"","seconds":1}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
