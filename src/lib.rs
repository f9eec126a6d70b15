//! Cache Facade - fail-open caching over a remote key-value store
//!
//! Compressed values, deterministic keys, prefix-based TTLs, tag and pattern
//! invalidation, and per-key stampede protection. Store faults degrade to
//! misses and no-ops instead of reaching the caller.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod store;
pub mod tasks;

pub use api::AppState;
pub use cache::{Cache, CacheBuilder, CacheStatus, EndpointCache};
pub use config::Config;
pub use store::{Capabilities, StoreAdapter};
pub use tasks::{spawn_cleanup_task, spawn_invalidation, Invalidation};
