//! Cache Entry Module
//!
//! Entries held by the in-process fallback store, and the clock that decides
//! when they expire.

use std::sync::atomic::{AtomicU64, Ordering};

// == Clock ==
/// Wall-clock source in Unix milliseconds.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now_ms(&self) -> u64;
}

/// The real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        current_timestamp_ms()
    }
}

/// A clock that only moves when told to. Used to exercise expiry without sleeping.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    pub fn advance_ms(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

// == Cache Entry ==
/// An encoded value with its absolute expiry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Encoded payload
    pub value: String,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry expiring `ttl_seconds` after `now_ms`.
    ///
    /// A TTL of zero means the entry never expires.
    pub fn new(value: String, ttl_seconds: u64, now_ms: u64) -> Self {
        let expires_at = (ttl_seconds > 0).then(|| now_ms.saturating_add(ttl_seconds.saturating_mul(1000)));
        Self { value, expires_at }
    }

    // == Is Expired ==
    /// An entry is expired once `now_ms` reaches its expiration time.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        match self.expires_at {
            Some(expires) => now_ms >= expires,
            None => false,
        }
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_with_ttl() {
        let entry = CacheEntry::new("0|1".to_string(), 60, 1_000);
        assert_eq!(entry.expires_at, Some(61_000));
        assert!(!entry.is_expired(60_999));
        assert!(entry.is_expired(61_000));
    }

    #[test]
    fn test_zero_ttl_never_expires() {
        let entry = CacheEntry::new("0|1".to_string(), 0, 1_000);
        assert!(entry.expires_at.is_none());
        assert!(!entry.is_expired(u64::MAX));
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(100);
        clock.advance_ms(1_100);
        assert_eq!(clock.now_ms(), 1_200);
    }

    #[test]
    fn test_system_clock_is_recent() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.now_ms() > 1_577_836_800_000);
    }
}
