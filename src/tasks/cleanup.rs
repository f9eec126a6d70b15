//! Fallback Sweep Task
//!
//! Background task that periodically drops expired fallback entries and idle
//! stampede guards. Expiry is otherwise lazy, checked on read.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::Cache;

/// Spawns a background task that sweeps the cache every `cleanup_interval_secs`.
///
/// The returned handle is aborted during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache = Cache::connect(Config::from_env()).await;
/// let cleanup_handle = spawn_cleanup_task(cache.clone(), 30);
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(cache: Cache, cleanup_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting fallback sweep task with interval of {} seconds",
            cleanup_interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.purge_expired();
            if removed > 0 {
                info!("Fallback sweep: removed {} expired entries", removed);
            } else {
                debug!("Fallback sweep: no expired entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::cache::ManualClock;
    use crate::config::Config;
    use crate::error::StoreResult;
    use crate::store::{Capabilities, StoreAdapter};

    /// Handshakes but implements nothing, so every value lands in the fallback.
    struct BareStore;

    #[async_trait]
    impl StoreAdapter for BareStore {
        fn name(&self) -> &'static str {
            "bare"
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::none()
        }

        async fn ping(&self) -> StoreResult<()> {
            Ok(())
        }
    }

    async fn fallback_cache(clock: Arc<ManualClock>) -> Cache {
        Cache::builder(Config::default())
            .adapter(Arc::new(BareStore))
            .clock(clock)
            .connect()
            .await
    }

    #[tokio::test]
    async fn test_cleanup_task_removes_expired_entries() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = fallback_cache(clock.clone()).await;
        cache.set("expire_soon", &json!("value"), Some(1)).await;
        cache.set("long_lived", &json!("value"), Some(3600)).await;
        assert_eq!(cache.stats().fallback_entries, 2);

        clock.advance_ms(1_500);
        let handle = spawn_cleanup_task(cache.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1_500)).await;

        assert_eq!(cache.stats().fallback_entries, 1);
        assert_eq!(cache.get("long_lived").await, Some(json!("value")));
        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let cache = fallback_cache(Arc::new(ManualClock::new(0))).await;

        let handle = spawn_cleanup_task(cache, 1);
        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
