//! Query client: cache orchestration and in-flight de-duplication

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use staychill_api_client::{ApiClient, ApiError, DispatchOptions, Method, RetryPolicy};
use staychill_session_sync::{Bus, TOPIC_SESSION_LOGIN, TOPIC_SESSION_LOGOUT};
use staychill_store::PersistentStore;

use crate::error::{QueryError, Result};
use crate::key::{ResourceKey, AUTH_SCOPED_MARKERS};
use crate::policy::{invalidation_targets, stale_time_for};

/// In-memory view of a resource with its fetch time
#[derive(Debug, Clone)]
struct MemoryEntry {
    value: Value,
    fetched_at: DateTime<Utc>,
}

impl MemoryEntry {
    fn is_fresh(&self, max_age: Duration) -> bool {
        let age = Utc::now().signed_duration_since(self.fetched_at);
        age <= chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX)
    }
}

type LoadResult = Result<Value>;
type InflightMap = Mutex<HashMap<String, broadcast::Sender<LoadResult>>>;

/// Configuration for the query client
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Upper bound on in-memory entries
    pub memory_capacity: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            memory_capacity: 10_000,
        }
    }
}

/// Removes the in-flight slot if the leading request is dropped before it
/// publishes a result, waking joined waiters with an error instead of
/// leaving them parked forever.
struct InflightGuard<'a> {
    map: &'a InflightMap,
    key: Option<String>,
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            let _ = self.map.lock().expect("inflight lock poisoned").remove(&key);
        }
    }
}

/// Orchestrates reads through memory, the durable store, and the network.
///
/// Constructed explicitly with its collaborators and torn down with
/// [`QueryClient::close`]; holds no global state. For a single key there is
/// at most one outstanding network call; requests for different keys are
/// unordered relative to one another.
pub struct QueryClient {
    memory: Cache<String, MemoryEntry>,
    inflight: InflightMap,
    store: Arc<PersistentStore>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl QueryClient {
    pub fn new(store: Arc<PersistentStore>) -> Arc<Self> {
        Self::with_config(store, QueryConfig::default())
    }

    pub fn with_config(store: Arc<PersistentStore>, config: QueryConfig) -> Arc<Self> {
        Arc::new(Self {
            memory: Cache::new(config.memory_capacity),
            inflight: Mutex::new(HashMap::new()),
            store,
            watcher: Mutex::new(None),
        })
    }

    /// Load a resource: fresh memory hit, else fresh durable entry, else
    /// the given fetch. Concurrent callers for the same key are coalesced
    /// onto a single in-flight request and all resolve together.
    pub async fn load<F, Fut>(&self, key: &ResourceKey, fetch: F) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Value, ApiError>>,
    {
        let cache_key = key.to_string();
        let max_age = stale_time_for(key);

        if let Some(entry) = self.memory.get(&cache_key).await {
            if entry.is_fresh(max_age) {
                debug!(key = %key, "Memory cache hit");
                return Ok(entry.value);
            }
        }

        // Join an in-flight request for this key instead of issuing another.
        let followed = {
            let mut inflight = self.inflight.lock().expect("inflight lock poisoned");
            if let Some(tx) = inflight.get(&cache_key) {
                Some(tx.subscribe())
            } else {
                let (tx, _) = broadcast::channel(1);
                inflight.insert(cache_key.clone(), tx);
                None
            }
        };
        if let Some(mut rx) = followed {
            debug!(key = %key, "Joining in-flight request");
            return match rx.recv().await {
                Ok(result) => result,
                Err(_) => Err(QueryError::abandoned(key)),
            };
        }

        let mut guard = InflightGuard {
            map: &self.inflight,
            key: Some(cache_key),
        };
        let result = self.load_uncached(key, max_age, fetch).await;

        // Take the slot first, then broadcast, so late arrivals start a new
        // load instead of joining a finished one.
        if let Some(cache_key) = guard.key.take() {
            let tx = self
                .inflight
                .lock()
                .expect("inflight lock poisoned")
                .remove(&cache_key);
            if let Some(tx) = tx {
                let _ = tx.send(result.clone());
            }
        }
        result
    }

    async fn load_uncached<F, Fut>(
        &self,
        key: &ResourceKey,
        max_age: Duration,
        fetch: F,
    ) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Value, ApiError>>,
    {
        let storage_key = key.storage_key();
        if self.store.is_fresh(&storage_key, max_age).await {
            if let Some(value) = self.store.get(&storage_key).await {
                debug!(key = %key, "Durable cache hit");
                self.remember(key, value.clone()).await;
                return Ok(value);
            }
        }

        debug!(key = %key, "Fetching from network");
        match fetch().await {
            Ok(value) => {
                self.store.set(&storage_key, &value, max_age).await;
                self.remember(key, value.clone()).await;
                Ok(value)
            }
            Err(error) => {
                warn!(key = %key, error = %error, "Load failed");
                Err(QueryError::from_api(key, error))
            }
        }
    }

    async fn remember(&self, key: &ResourceKey, value: Value) {
        self.memory
            .insert(
                key.to_string(),
                MemoryEntry {
                    value,
                    fetched_at: Utc::now(),
                },
            )
            .await;
    }

    /// Load `key` through the dispatcher with the default retry policy.
    pub async fn get(&self, api: &ApiClient, key: &ResourceKey) -> Result<Value> {
        let path = key.request_path();
        self.load(key, move || async move { api.get(&path).await })
            .await
    }

    /// Load the current-user resource. Anonymous visitors legitimately get
    /// a 401 here, so retry-on-unauthorized is disabled for this probe.
    pub async fn current_user(&self, api: &ApiClient) -> Result<Value> {
        let key = ResourceKey::new("/api/me");
        let options = DispatchOptions {
            retry: RetryPolicy::no_auth_retry(),
            ..Default::default()
        };
        self.load(&key, move || async move {
            api.send(Method::GET, "/api/me", None, &options).await
        })
        .await
    }

    /// Dispatch a mutation and invalidate the read keys it affects, per the
    /// invalidation graph. Failures are surfaced to the caller directly.
    pub async fn mutate(
        &self,
        api: &ApiClient,
        method: Method,
        key: &ResourceKey,
        body: Option<&Value>,
    ) -> Result<Value> {
        let options = DispatchOptions::default();
        let result = api
            .send(method, &key.request_path(), body, &options)
            .await
            .map_err(|e| QueryError::from_api(key, e))?;

        self.invalidate_everywhere(key.path()).await;
        for target in invalidation_targets(key) {
            self.invalidate_everywhere(target).await;
        }
        Ok(result)
    }

    /// Drop `prefix` from both the in-memory cache and the durable store,
    /// markers included, so no layer can serve the pre-mutation payload.
    async fn invalidate_everywhere(&self, prefix: &str) {
        self.invalidate_prefix(prefix).await;
        self.store.remove_prefix(prefix).await;
    }

    /// Drop one key from the in-memory cache.
    pub async fn invalidate(&self, key: &ResourceKey) {
        self.memory.invalidate(&key.to_string()).await;
    }

    /// Drop every in-memory key starting with `prefix`.
    pub async fn invalidate_prefix(&self, prefix: &str) {
        let matching: Vec<_> = self
            .memory
            .iter()
            .map(|(k, _)| k)
            .filter(|k| k.starts_with(prefix))
            .collect();
        for k in matching {
            self.memory.invalidate(k.as_ref()).await;
        }
    }

    /// Drop everything held in memory.
    pub fn clear(&self) {
        self.memory.invalidate_all();
    }

    /// Invalidate session-scoped resources whenever another view of the
    /// application logs in or out, so no holder of this cache keeps showing
    /// a stale authenticated view.
    pub fn watch_session(self: &Arc<Self>, bus: &Bus) {
        let mut login = bus.subscribe(TOPIC_SESSION_LOGIN);
        let mut logout = bus.subscribe(TOPIC_SESSION_LOGOUT);
        let weak = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    r = login.recv() => r,
                    r = logout.recv() => r,
                };
                match event {
                    Ok(_) => {
                        let Some(client) = weak.upgrade() else { break };
                        client.invalidate_auth_scoped().await;
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        let mut watcher = self.watcher.lock().expect("watcher lock poisoned");
        if let Some(old) = watcher.replace(handle) {
            old.abort();
        }
    }

    async fn invalidate_auth_scoped(&self) {
        let matching: Vec<_> = self
            .memory
            .iter()
            .map(|(k, _)| k)
            .filter(|k| AUTH_SCOPED_MARKERS.iter().any(|m| k.contains(m)))
            .collect();
        let dropped = matching.len();
        for k in matching {
            self.memory.invalidate(k.as_ref()).await;
        }
        debug!(dropped, "Invalidated session-scoped cache entries");
    }

    /// Tear down: stop the session watcher and drop all cached state.
    pub fn close(&self) {
        if let Some(handle) = self.watcher.lock().expect("watcher lock poisoned").take() {
            handle.abort();
        }
        self.inflight
            .lock()
            .expect("inflight lock poisoned")
            .clear();
        self.memory.invalidate_all();
    }
}
