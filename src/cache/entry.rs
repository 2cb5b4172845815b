//! Durable cache entry format and the `Cacheable` bound

use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Trait for values that can live in the cache.
///
/// `SCHEMA_VERSION` tags persisted entries. Bump it whenever the serialized
/// shape of the type changes; entries written under another version are then
/// discarded as misses instead of being handed to the consumer.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    const SCHEMA_VERSION: u32 = 0;
}

macro_rules! cacheable_std {
    ($($ty:ty),* $(,)?) => {
        $(impl Cacheable for $ty {})*
    };
}

cacheable_std!(bool, i32, i64, u32, u64, f64, String, serde_json::Value);

impl<T: Cacheable> Cacheable for Vec<T> {
    const SCHEMA_VERSION: u32 = T::SCHEMA_VERSION;
}

impl<T: Cacheable> Cacheable for Option<T> {
    const SCHEMA_VERSION: u32 = T::SCHEMA_VERSION;
}

fn is_unversioned(version: &u32) -> bool {
    *version == 0
}

/// Wrapper struct for cached data stored in durable storage
///
/// Serialized as `{"data": ..., "timestamp": <epoch ms>}`; a `"version"` field
/// is only present for non-zero schema versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// The cached data
    pub data: T,
    /// When the data was obtained, in epoch milliseconds
    pub timestamp: i64,
    /// Schema version of `data`
    #[serde(default, skip_serializing_if = "is_unversioned")]
    pub version: u32,
}

impl<T: Cacheable> CacheEntry<T> {
    pub fn new(data: T, timestamp: i64) -> Self {
        Self {
            data,
            timestamp,
            version: T::SCHEMA_VERSION,
        }
    }

    /// Age of the entry relative to `now`, in milliseconds
    ///
    /// Saturates instead of overflowing for timestamps far from `now`.
    /// Negative for entries stamped in the future.
    pub fn age_millis(&self, now: i64) -> i64 {
        now.saturating_sub(self.timestamp)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses a stored entry.
    ///
    /// Returns `Err` with a description when the text is not a valid entry for
    /// `T` or was written under a different schema version.
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        let entry: CacheEntry<T> = serde_json::from_str(raw).map_err(DecodeError::Malformed)?;
        if entry.version != T::SCHEMA_VERSION {
            return Err(DecodeError::VersionMismatch {
                found: entry.version,
                expected: T::SCHEMA_VERSION,
            });
        }
        Ok(entry)
    }
}

/// Why a stored entry could not be used
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed entry: {0}")]
    Malformed(serde_json::Error),

    #[error("schema version {found} does not match expected {expected}")]
    VersionMismatch { found: u32, expected: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Reading {
        value: i32,
    }

    impl Cacheable for Reading {
        const SCHEMA_VERSION: u32 = 2;
    }

    #[test]
    fn test_unversioned_entry_has_plain_layout() {
        let entry = CacheEntry::new(5_i64, 1_700_000_000_000);
        let json = entry.encode().unwrap();
        assert_eq!(json, r#"{"data":5,"timestamp":1700000000000}"#);
    }

    #[test]
    fn test_versioned_entry_carries_version() {
        let entry = CacheEntry::new(Reading { value: 3 }, 10);
        let json = entry.encode().unwrap();
        assert!(json.contains(r#""version":2"#));

        let decoded = CacheEntry::<Reading>::decode(&json).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn test_decode_plain_layout_written_elsewhere() {
        let decoded = CacheEntry::<i64>::decode(r#"{ "data": 7, "timestamp": 123 }"#).unwrap();
        assert_eq!(decoded.data, 7);
        assert_eq!(decoded.timestamp, 123);
    }

    #[test]
    fn test_decode_rejects_version_mismatch() {
        // Written before `Reading` had a schema version
        let raw = r#"{"data":{"value":1},"timestamp":5}"#;
        match CacheEntry::<Reading>::decode(raw) {
            Err(DecodeError::VersionMismatch { found, expected }) => {
                assert_eq!(found, 0);
                assert_eq!(expected, 2);
            }
            other => panic!("Expected version mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        let raw = r#"{"data":"not a number","timestamp":5}"#;
        assert!(matches!(
            CacheEntry::<i64>::decode(raw),
            Err(DecodeError::Malformed(_))
        ));
        assert!(CacheEntry::<i64>::decode("{ invalid json }").is_err());
        assert!(CacheEntry::<i64>::decode(r#"{"data":5}"#).is_err());
    }

    #[test]
    fn test_age_millis() {
        let entry = CacheEntry::new(1_i64, 1_000);
        assert_eq!(entry.age_millis(91_000), 90_000);
    }

    #[test]
    fn test_age_millis_saturates_on_extreme_timestamps() {
        let entry = CacheEntry::new(1_i64, i64::MIN);
        assert_eq!(entry.age_millis(1_700_000_000_000), i64::MAX);

        let entry = CacheEntry::new(1_i64, i64::MAX);
        assert_eq!(entry.age_millis(-1_700_000_000_000), i64::MIN);
    }

    #[test]
    fn test_age_millis_negative_for_future_entry() {
        let entry = CacheEntry::new(1_i64, 2_000);
        assert_eq!(entry.age_millis(1_000), -1_000);
    }
}
