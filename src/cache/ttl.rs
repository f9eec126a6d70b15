//! TTL Resolver Module
//!
//! Maps keys to expiry durations through an ordered prefix override table.

use std::sync::Arc;

use arc_swap::ArcSwap;

/// Default TTL in seconds when neither an explicit TTL nor an override applies.
pub const DEFAULT_TTL: u64 = 300;

// == TTL Resolver ==
/// Read-mostly prefix -> seconds table with a global default.
///
/// Lookups are lock-free; overrides are replaced copy-on-write.
#[derive(Debug)]
pub struct TtlResolver {
    default_ttl: u64,
    overrides: ArcSwap<Vec<(String, u64)>>,
}

impl TtlResolver {
    pub fn new(default_ttl: u64, overrides: Vec<(String, u64)>) -> Self {
        let resolver = Self {
            default_ttl,
            overrides: ArcSwap::from_pointee(Vec::new()),
        };
        for (prefix, seconds) in overrides {
            resolver.set_ttl_override(prefix, seconds);
        }
        resolver
    }

    pub fn default_ttl(&self) -> u64 {
        self.default_ttl
    }

    // == Resolve ==
    /// Returns the effective TTL for `key`.
    ///
    /// An explicit TTL is authoritative, `Some(0)` included. Otherwise the
    /// first override whose prefix starts `key` wins, then the default.
    pub fn resolve_ttl(&self, key: &str, explicit_ttl: Option<u64>) -> u64 {
        if let Some(ttl) = explicit_ttl {
            return ttl;
        }
        self.overrides
            .load()
            .iter()
            .find(|(prefix, _)| key.starts_with(prefix.as_str()))
            .map(|(_, seconds)| *seconds)
            .unwrap_or(self.default_ttl)
    }

    // == Set Override ==
    /// Inserts or replaces the override for `prefix`.
    ///
    /// A replaced override keeps its position; a new one is appended.
    /// Entries already stored keep their TTL.
    pub fn set_ttl_override(&self, prefix: impl Into<String>, seconds: u64) {
        let prefix = prefix.into();
        self.overrides.rcu(|current| {
            let mut next = Vec::clone(current);
            match next.iter_mut().find(|(p, _)| *p == prefix) {
                Some(existing) => existing.1 = seconds,
                None => next.push((prefix.clone(), seconds)),
            }
            Arc::new(next)
        });
    }

    /// Snapshot of the override table in match order.
    pub fn overrides(&self) -> Vec<(String, u64)> {
        self.overrides.load().as_ref().clone()
    }
}

impl Default for TtlResolver {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> TtlResolver {
        TtlResolver::new(300, vec![("comments:list".to_string(), 120)])
    }

    #[test]
    fn test_override_prefix_match() {
        let ttl = resolver();
        assert_eq!(ttl.resolve_ttl("comments:list:42", None), 120);
        assert_eq!(ttl.resolve_ttl("other:1", None), 300);
    }

    #[test]
    fn test_explicit_ttl_is_authoritative() {
        let ttl = resolver();
        assert_eq!(ttl.resolve_ttl("x", Some(0)), 0);
        assert_eq!(ttl.resolve_ttl("comments:list:1", Some(5)), 5);
    }

    #[test]
    fn test_first_matching_prefix_wins() {
        let ttl = TtlResolver::new(300, vec![("posts".to_string(), 10), ("posts:list".to_string(), 20)]);
        assert_eq!(ttl.resolve_ttl("posts:list:1", None), 10);
    }

    #[test]
    fn test_set_override_is_idempotent() {
        let ttl = resolver();
        ttl.set_ttl_override("feed", 60);
        ttl.set_ttl_override("feed", 60);
        ttl.set_ttl_override("comments:list", 90);

        assert_eq!(
            ttl.overrides(),
            vec![("comments:list".to_string(), 90), ("feed".to_string(), 60)]
        );
        assert_eq!(ttl.resolve_ttl("feed:9", None), 60);
        assert_eq!(ttl.resolve_ttl("comments:list:1", None), 90);
    }
}
