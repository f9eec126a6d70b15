//! Stampede Guard Module
//!
//! Per-key async mutexes so that only one task recomputes a missing value at a
//! time. Guards are created lazily. Once the table grows past its bound, idle
//! guards (no holder and no waiter) are pruned; a guard someone holds or
//! awaits is never removed, so two guards can never exist for one key.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Default soft bound on the number of guards kept in the table.
pub const DEFAULT_MAX_GUARDS: usize = 10_000;

// == Stampede Guard ==
#[derive(Debug)]
pub struct StampedeGuard {
    locks: DashMap<String, Arc<Mutex<()>>>,
    max_guards: usize,
    contended: AtomicU64,
}

/// Exclusive scope for one key. The lock is released when this is dropped,
/// including when the owning future is cancelled.
#[derive(Debug)]
pub struct KeyGuard {
    key: String,
    _permit: OwnedMutexGuard<()>,
}

impl KeyGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl StampedeGuard {
    pub fn new(max_guards: usize) -> Self {
        Self {
            locks: DashMap::new(),
            max_guards: max_guards.max(1),
            contended: AtomicU64::new(0),
        }
    }

    // == Acquire ==
    /// Waits until this task is the only one inside the scope for `key`.
    pub async fn acquire(&self, key: &str) -> KeyGuard {
        let lock = self.lock_for(key);
        let permit = match lock.clone().try_lock_owned() {
            Ok(permit) => permit,
            Err(_) => {
                self.contended.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Waiting for in-flight computation");
                lock.lock_owned().await
            }
        };
        KeyGuard {
            key: key.to_string(),
            _permit: permit,
        }
    }

    fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.get(key) {
            return Arc::clone(lock.value());
        }
        if self.locks.len() >= self.max_guards {
            self.prune_idle();
        }
        // Cloned while the shard lock is held, so pruning cannot race it.
        Arc::clone(
            self.locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    /// Drops guards nobody holds or waits on. Returns the number removed.
    pub fn prune_idle(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        let removed = before.saturating_sub(self.locks.len());
        if removed > 0 {
            debug!(removed, "Pruned idle stampede guards");
        }
        removed
    }

    /// Number of guards currently tracked.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// How many acquisitions had to wait behind another task.
    pub fn contended(&self) -> u64 {
        self.contended.load(Ordering::Relaxed)
    }
}

impl Default for StampedeGuard {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_GUARDS)
    }
}
