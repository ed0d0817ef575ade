use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tag written into every durable record; anything else is treated as foreign.
pub const RECORD_FORMAT: &str = "stock-advisor-cache/v1";

/// A cached value with its creation time and time-to-live.
///
/// Fresh iff `now < created_at + ttl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub format: String,
    pub key: String,
    pub value: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub ttl_ms: u64,
}

impl CacheEntry {
    pub fn new(key: &str, value: serde_json::Value, created_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            format: RECORD_FORMAT.to_string(),
            key: key.to_string(),
            value,
            created_at,
            ttl_ms: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// `None` when the expiry lies beyond what chrono can represent
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let ttl = chrono::Duration::from_std(self.ttl()).ok()?;
        self.created_at.checked_add_signed(ttl)
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at() {
            Some(expires_at) => now < expires_at,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_freshness_boundary_is_exclusive() {
        let entry = CacheEntry::new("AAPL:fundamental", json!(1), at(0), Duration::from_secs(60));
        assert!(entry.is_fresh(at(0)));
        assert!(entry.is_fresh(at(59)));
        assert!(!entry.is_fresh(at(60)));
        assert!(!entry.is_fresh(at(61)));
    }

    #[test]
    fn test_zero_ttl_is_never_fresh() {
        let entry = CacheEntry::new("k", json!(null), at(0), Duration::ZERO);
        assert!(!entry.is_fresh(at(0)));
    }

    #[test]
    fn test_unrepresentable_expiry_stays_fresh() {
        let entry = CacheEntry::new("k", json!(null), at(0), Duration::MAX);
        assert!(entry.expires_at().is_none());
        assert!(entry.is_fresh(at(10_000_000)));
    }
}
