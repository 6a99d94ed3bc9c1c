//! File-backed store implementation

use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::keys::{in_namespace, key_matches_resource, LAST_FETCH_PREFIX};
use crate::types::{CacheEntry, FetchMarker};

/// Durable key/value cache backed by one JSON file per entry.
///
/// File names are derived by hashing the storage key, so keys may contain
/// any characters. All operations are best-effort: failures are logged and
/// surface as misses or no-ops, never as errors to the caller.
pub struct PersistentStore {
    dir: PathBuf,
}

impl PersistentStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            warn!(dir = %dir.display(), error = %e, "Failed to create cache directory");
        }
        Self { dir }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{}.json", hex::encode(digest)))
    }

    fn marker_key(key: &str) -> String {
        format!("{}{}", LAST_FETCH_PREFIX, key)
    }

    /// Write `value` under `key` with the given time-to-live, and record the
    /// fetch time in a parallel marker.
    pub async fn set(&self, key: &str, value: &Value, ttl: Duration) {
        let now = Utc::now();
        // Absurd TTLs clamp to a century rather than overflowing the date.
        let expiry = now
            + ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::days(36_500));
        let entry = CacheEntry {
            key: key.to_string(),
            data: value.clone(),
            expiry,
        };
        self.write_json(key, &entry).await;

        let marker_key = Self::marker_key(key);
        let marker = FetchMarker {
            key: marker_key.clone(),
            fetched_at: now,
        };
        self.write_json(&marker_key, &marker).await;
    }

    /// Read the value stored under `key`. Expired entries are deleted on
    /// read and reported absent.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let entry: CacheEntry = self.read_json(key).await?;
        if entry.is_expired(Utc::now()) {
            debug!(key, "Cache entry expired, evicting");
            self.remove(key).await;
            return None;
        }
        Some(entry.data)
    }

    /// Whether `key` was fetched within the last `max_age`.
    pub async fn is_fresh(&self, key: &str, max_age: Duration) -> bool {
        let Some(marker) = self.read_json::<FetchMarker>(&Self::marker_key(key)).await else {
            return false;
        };
        let age = Utc::now().signed_duration_since(marker.fetched_at);
        age <= ChronoDuration::from_std(max_age).unwrap_or(ChronoDuration::MAX)
    }

    /// Remove `key` and its last-fetch marker.
    pub async fn remove(&self, key: &str) {
        for k in [key.to_string(), Self::marker_key(key)] {
            let path = self.path_for(&k);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(key = %k, error = %e, "Cache remove failed"),
            }
        }
    }

    /// Remove every entry belonging to this application's namespaces.
    ///
    /// Each file is inspected before deletion; anything whose stored key is
    /// outside the namespace is left alone.
    pub async fn clear_all(&self) {
        let removed = self.remove_where(in_namespace).await;
        debug!(removed, "Cleared cache namespace");
    }

    /// Remove every entry (and its last-fetch marker) whose logical
    /// resource falls under `resource_prefix`, so stale durable copies
    /// cannot outlive an invalidation.
    pub async fn remove_prefix(&self, resource_prefix: &str) {
        let removed = self
            .remove_where(|key| {
                let key = key.strip_prefix(LAST_FETCH_PREFIX).unwrap_or(key);
                key_matches_resource(key, resource_prefix)
            })
            .await;
        debug!(prefix = resource_prefix, removed, "Removed cache entries under prefix");
    }

    async fn remove_where(&self, matches: impl Fn(&str) -> bool) -> usize {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) => {
                warn!(error = %e, "Cache scan failed");
                return 0;
            }
        };

        let mut removed = 0usize;
        loop {
            let item = match dir.next_entry().await {
                Ok(Some(item)) => item,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Cache scan failed");
                    break;
                }
            };
            let path = item.path();
            let Ok(bytes) = tokio::fs::read(&path).await else {
                continue;
            };
            let Ok(value) = serde_json::from_slice::<Value>(&bytes) else {
                continue;
            };
            let selected = value
                .get("key")
                .and_then(Value::as_str)
                .map(&matches)
                .unwrap_or(false);
            if selected && tokio::fs::remove_file(&path).await.is_ok() {
                removed += 1;
            }
        }
        removed
    }

    async fn write_json<T: serde::Serialize>(&self, key: &str, value: &T) {
        let path = self.path_for(key);
        match serde_json::to_vec(value) {
            Ok(bytes) => {
                if let Err(e) = tokio::fs::write(&path, bytes).await {
                    warn!(key, error = %e, "Cache write failed");
                }
            }
            Err(e) => warn!(key, error = %e, "Cache serialization failed"),
        }
    }

    async fn read_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(key, error = %e, "Cache read failed");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Cache entry corrupt, dropping");
                let _ = tokio::fs::remove_file(&path).await;
                None
            }
        }
    }
}
