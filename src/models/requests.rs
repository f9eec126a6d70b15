//! Request DTOs for the cache admin API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

/// Longest accepted key prefix or pattern.
pub const MAX_PATTERN_LENGTH: usize = 256;

/// Request body for pattern invalidation (POST /cache/invalidate)
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateRequest {
    /// Glob pattern, e.g. `"posts:list:*"`
    pub pattern: String,
}

impl InvalidateRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.pattern.trim().is_empty() {
            return Some("Pattern cannot be empty".to_string());
        }
        if self.pattern.len() > MAX_PATTERN_LENGTH {
            return Some(format!(
                "Pattern exceeds maximum length of {} characters",
                MAX_PATTERN_LENGTH
            ));
        }
        None
    }
}

/// Request body for a TTL override (PUT /cache/ttl)
#[derive(Debug, Clone, Deserialize)]
pub struct TtlOverrideRequest {
    /// Key prefix the override applies to
    pub prefix: String,
    /// TTL in seconds; `0` stores matching keys without expiry
    pub seconds: u64,
}

impl TtlOverrideRequest {
    pub fn validate(&self) -> Option<String> {
        if self.prefix.is_empty() {
            return Some("Prefix cannot be empty".to_string());
        }
        if self.prefix.len() > MAX_PATTERN_LENGTH {
            return Some(format!(
                "Prefix exceeds maximum length of {} characters",
                MAX_PATTERN_LENGTH
            ));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalidate_request_deserialize() {
        let req: InvalidateRequest = serde_json::from_str(r#"{"pattern": "posts:*"}"#).unwrap();
        assert_eq!(req.pattern, "posts:*");
        assert!(req.validate().is_none());
    }

    #[test]
    fn test_invalidate_request_rejects_blank_pattern() {
        let req = InvalidateRequest {
            pattern: "  ".to_string(),
        };
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_ttl_override_request() {
        let req: TtlOverrideRequest =
            serde_json::from_str(r#"{"prefix": "comments:list", "seconds": 120}"#).unwrap();
        assert_eq!(req.seconds, 120);
        assert!(req.validate().is_none());

        let req = TtlOverrideRequest {
            prefix: "x".repeat(MAX_PATTERN_LENGTH + 1),
            seconds: 1,
        };
        assert!(req.validate().is_some());
    }
}
