//! Scheduled Invalidation
//!
//! Fire-and-forget invalidation for callers that do not want to wait on a
//! keyspace walk, such as request handlers finishing a write.

use tokio::runtime::{Builder, Handle};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::cache::Cache;

/// What to invalidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    /// Glob pattern, e.g. `"posts:list:*"`
    Pattern(String),
    /// Every key recorded under a tag
    Tag(String),
}

impl Invalidation {
    pub fn pattern(pattern: impl Into<String>) -> Self {
        Invalidation::Pattern(pattern.into())
    }

    pub fn tag(tag: impl Into<String>) -> Self {
        Invalidation::Tag(tag.into())
    }

    /// Runs the invalidation to completion, returning the number of keys removed.
    pub async fn run(self, cache: &Cache) -> usize {
        match self {
            Invalidation::Pattern(pattern) => cache.invalidate(&pattern).await,
            Invalidation::Tag(tag) => cache.invalidate_by_tag(&tag).await,
        }
    }
}

/// Schedules `target` on the current runtime and returns its handle.
///
/// Outside any runtime the invalidation runs to completion on a temporary
/// single-threaded runtime before returning, and `None` is returned.
pub fn spawn_invalidation(cache: &Cache, target: Invalidation) -> Option<JoinHandle<usize>> {
    let cache = cache.clone();
    match Handle::try_current() {
        Ok(handle) => {
            debug!(?target, "Scheduling cache invalidation");
            Some(handle.spawn(async move { target.run(&cache).await }))
        }
        Err(_) => {
            match Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => {
                    runtime.block_on(target.run(&cache));
                }
                Err(e) => error!(error = %e, ?target, "Failed to start runtime for invalidation"),
            }
            None
        }
    }
}
