//! Keyspace item: a value plus its optional expiry

use super::value::Value;

/// A single value in a keyspace
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// The value
    pub value: Value,

    /// Absolute expiry, in milliseconds of logical time
    pub expire_at: Option<u64>,
}

impl Item {
    /// Create a new item without expiration
    pub fn new(value: Value) -> Self {
        Item {
            value,
            expire_at: None,
        }
    }

    /// Create a new item expiring at `expire_at`
    pub fn with_expiration(value: Value, expire_at: u64) -> Self {
        Item {
            value,
            expire_at: Some(expire_at),
        }
    }

    /// An item is visible up to and including its expiry instant
    pub fn is_expired(&self, now_ms: u64) -> bool {
        matches!(self.expire_at, Some(at) if now_ms > at)
    }

    /// Remaining time to live in milliseconds, `None` when persistent
    pub fn ttl_ms(&self, now_ms: u64) -> Option<u64> {
        self.expire_at.map(|at| at.saturating_sub(now_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_boundary() {
        let item = Item::with_expiration(Value::string("v"), 1_000);
        assert!(!item.is_expired(999));
        assert!(!item.is_expired(1_000));
        assert!(item.is_expired(1_001));
        assert_eq!(item.ttl_ms(400), Some(600));
        assert_eq!(Item::new(Value::string("v")).ttl_ms(400), None);
    }
}
