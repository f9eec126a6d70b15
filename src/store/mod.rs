//! Backing Store Module
//!
//! The capability-checked interface the facade talks to, and its adapters.
//!
//! Every adapter declares the operation groups it implements through
//! [`Capabilities`]. The facade never calls an undeclared group; it serves
//! those from the in-process fallback store instead.

mod lru;
mod memory;
mod remote;

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};

pub use lru::{LruTracker, Page};
pub use memory::MemoryStore;
pub use remote::RedisStore;

// == Capabilities ==
/// Operation groups an adapter supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// `get`, `set`, `delete`, `exists`
    pub key_value: bool,
    /// `increment`
    pub counters: bool,
    /// cursor-based `scan`
    pub scan: bool,
    /// pipelined `get_many` / `set_many`
    pub pipeline: bool,
    /// `sadd`, `smembers`, `expire` for tag tracking
    pub sets: bool,
}

impl Capabilities {
    pub const fn all() -> Self {
        Self {
            key_value: true,
            counters: true,
            scan: true,
            pipeline: true,
            sets: true,
        }
    }

    pub const fn none() -> Self {
        Self {
            key_value: false,
            counters: false,
            scan: false,
            pipeline: false,
            sets: false,
        }
    }

    /// Pattern invalidation deletes what SCAN yields, so it needs `key_value` too.
    pub const fn can_scan_delete(&self) -> bool {
        self.scan && self.key_value
    }

    /// Tag records are read with `smembers` and dropped with `delete`.
    pub const fn can_track_tags(&self) -> bool {
        self.sets && self.key_value
    }
}

// == Store Adapter ==
/// Remote key-value store as seen by the facade.
///
/// Values are the encoded strings produced by the value codec. A TTL of
/// `0` stores without expiry. Methods outside the declared capabilities
/// keep their default body and report [`StoreError::Unsupported`].
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    /// Connection handshake, run once at init.
    async fn ping(&self) -> StoreResult<()>;

    /// Releases connections. Default is a no-op.
    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn get(&self, _key: &str) -> StoreResult<Option<String>> {
        Err(StoreError::Unsupported("get"))
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: u64) -> StoreResult<()> {
        Err(StoreError::Unsupported("set"))
    }

    /// Deletes keys, returning how many existed.
    async fn delete(&self, _keys: &[String]) -> StoreResult<u64> {
        Err(StoreError::Unsupported("delete"))
    }

    async fn exists(&self, _key: &str) -> StoreResult<bool> {
        Err(StoreError::Unsupported("exists"))
    }

    async fn increment(&self, _key: &str, _amount: i64) -> StoreResult<i64> {
        Err(StoreError::Unsupported("increment"))
    }

    /// One page of keys matching a glob pattern. Iteration is complete when
    /// the returned cursor is `0`.
    async fn scan(&self, _cursor: u64, _pattern: &str, _count: usize) -> StoreResult<(u64, Vec<String>)> {
        Err(StoreError::Unsupported("scan"))
    }

    /// Values for `keys` in order, in one round trip.
    async fn get_many(&self, _keys: &[String]) -> StoreResult<Vec<Option<String>>> {
        Err(StoreError::Unsupported("get_many"))
    }

    /// Stores all items with the same TTL in one round trip.
    async fn set_many(&self, _items: &[(String, String)], _ttl: u64) -> StoreResult<()> {
        Err(StoreError::Unsupported("set_many"))
    }

    /// Adds `member` to each set in `keys`, applying `ttl` to each set when non-zero.
    async fn sadd(&self, _keys: &[String], _member: &str, _ttl: u64) -> StoreResult<()> {
        Err(StoreError::Unsupported("sadd"))
    }

    async fn smembers(&self, _key: &str) -> StoreResult<Vec<String>> {
        Err(StoreError::Unsupported("smembers"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PingOnly;

    #[async_trait]
    impl StoreAdapter for PingOnly {
        fn name(&self) -> &'static str {
            "ping-only"
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::none()
        }

        async fn ping(&self) -> StoreResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_undeclared_operations_report_unsupported() {
        let store = PingOnly;
        assert!(store.ping().await.is_ok());
        assert!(matches!(store.get("k").await, Err(StoreError::Unsupported("get"))));
        assert!(matches!(
            store.scan(0, "*", 10).await,
            Err(StoreError::Unsupported("scan"))
        ));
        assert!(store.close().await.is_ok());
    }

    #[test]
    fn test_capability_presets() {
        assert!(Capabilities::all().key_value && Capabilities::all().sets);
        assert_eq!(Capabilities::none(), Capabilities::default());
    }

    #[test]
    fn test_scan_and_sets_require_key_value() {
        let partial = Capabilities {
            scan: true,
            sets: true,
            ..Capabilities::none()
        };
        assert!(!partial.can_scan_delete());
        assert!(!partial.can_track_tags());

        let full = Capabilities::all();
        assert!(full.can_scan_delete() && full.can_track_tags());
    }
}
