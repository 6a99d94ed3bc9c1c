//! Stored entry types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A durable cache entry: the payload plus its absolute expiry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub data: serde_json::Value,
    pub expiry: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expiry
    }
}

/// Last-fetch marker kept next to each entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct FetchMarker {
    pub key: String,
    pub fetched_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_entry_expiry() {
        let now = Utc::now();
        let entry = CacheEntry {
            key: "cache_/api/properties".to_string(),
            data: json!([{"id": 1}]),
            expiry: now + Duration::minutes(30),
        };
        assert!(!entry.is_expired(now));
        assert!(!entry.is_expired(now + Duration::minutes(30)));
        assert!(entry.is_expired(now + Duration::minutes(31)));
    }

    #[test]
    fn test_entry_round_trips_through_json() {
        let entry = CacheEntry {
            key: "staychill_auth_user".to_string(),
            data: json!({"id": "u1", "name": "Ada"}),
            expiry: Utc::now(),
        };
        let json = serde_json::to_string(&entry).unwrap();
        let back: CacheEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.key, entry.key);
        assert_eq!(back.data, entry.data);
        assert_eq!(back.expiry, entry.expiry);
    }
}
