use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One cached value with its bookkeeping.
///
/// Timestamps are milliseconds since the Unix epoch as reported by the
/// store's clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    #[serde(with = "value_base64")]
    pub value: Vec<u8>,
    pub created_at: u64,
    pub expires_at: u64,
    pub tags: Vec<String>,
    pub last_access_at: u64,
    pub access_count: u64,
    /// Monotonic touch order inside the memory tier; breaks LRU ties between
    /// entries touched within the same millisecond.
    #[serde(skip)]
    pub(crate) access_seq: u64,
}

impl CacheEntry {
    pub fn new(
        key: impl Into<String>,
        value: Vec<u8>,
        now_ms: u64,
        ttl: Duration,
        tags: Vec<String>,
    ) -> Self {
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        Self {
            key: key.into(),
            value,
            created_at: now_ms,
            expires_at: now_ms.saturating_add(ttl_ms),
            tags,
            last_access_at: now_ms,
            access_count: 0,
            access_seq: 0,
        }
    }

    /// Expired strictly after `expires_at`.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms > self.expires_at
    }

    pub fn has_any_tag(&self, tags: &[String]) -> bool {
        self.tags.iter().any(|tag| tags.contains(tag))
    }

    pub(crate) fn touch(&mut self, now_ms: u64, seq: u64) {
        self.last_access_at = now_ms;
        self.access_count += 1;
        self.access_seq = seq;
    }
}

mod value_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_is_strict() {
        let entry = CacheEntry::new("a", vec![1], 1_000, Duration::from_millis(10), vec![]);
        assert_eq!(entry.expires_at, 1_010);
        assert!(!entry.is_expired(1_010));
        assert!(entry.is_expired(1_011));
    }

    #[test]
    fn test_tag_intersection() {
        let entry = CacheEntry::new(
            "a",
            vec![],
            0,
            Duration::from_secs(1),
            vec!["homework".into(), "feed".into()],
        );
        assert!(entry.has_any_tag(&["chat".into(), "feed".into()]));
        assert!(!entry.has_any_tag(&["chat".into()]));
        assert!(!entry.has_any_tag(&[]));
    }

    #[test]
    fn test_serialized_value_is_base64() {
        let entry = CacheEntry::new("a", b"hi".to_vec(), 0, Duration::from_secs(1), vec![]);
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"aGk=\""));
        let back: CacheEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.value, b"hi");
    }
}
