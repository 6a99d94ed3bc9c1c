//! Login/logout session bookkeeping

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::info;

use staychill_store::{PersistentStore, KEY_AUTH_USER, KEY_SESSION_TOKEN};

use crate::bus::{Bus, TOPIC_SESSION_LOGIN, TOPIC_SESSION_LOGOUT};

/// Identity rarely changes mid-session; matches the staleness policy for
/// the current-user resource.
const AUTH_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Writes and clears the durable session markers and announces the change
/// on the bus, so every holder of an in-memory cache invalidates its view
/// of the user.
pub struct SessionManager {
    store: Arc<PersistentStore>,
    bus: Bus,
}

impl SessionManager {
    pub fn new(store: Arc<PersistentStore>, bus: Bus) -> Self {
        Self { store, bus }
    }

    /// Record a successful login: cache the user projection, write the
    /// timestamped session marker, and announce it.
    pub async fn login(&self, user: &Value) {
        let now = chrono::Utc::now().to_rfc3339();
        self.store.set(KEY_AUTH_USER, user, AUTH_SESSION_TTL).await;
        self.store
            .set(
                KEY_SESSION_TOKEN,
                &json!({ "logged_in_at": now }),
                AUTH_SESSION_TTL,
            )
            .await;
        info!("Session started");
        self.bus.publish(TOPIC_SESSION_LOGIN, &now);
    }

    /// Clear every durable trace of the session and announce the logout.
    pub async fn logout(&self) {
        self.store.remove(KEY_AUTH_USER).await;
        self.store.remove(KEY_SESSION_TOKEN).await;
        info!("Session ended");
        self.bus.publish(TOPIC_SESSION_LOGOUT, "");
    }

    /// The cached user projection, if one is present and unexpired.
    pub async fn current_user(&self) -> Option<Value> {
        self.store.get(KEY_AUTH_USER).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn manager() -> (tempfile::TempDir, SessionManager, Bus) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(PersistentStore::open(dir.path()).await);
        let bus = Bus::new();
        (dir, SessionManager::new(store, bus.clone()), bus)
    }

    #[tokio::test]
    async fn test_login_writes_user_and_session_marker() {
        let (_dir, manager, _bus) = manager().await;
        manager.login(&json!({"id": "u1", "name": "Ada"})).await;

        let user = manager.current_user().await.unwrap();
        assert_eq!(user["id"], "u1");
    }

    #[tokio::test]
    async fn test_logout_clears_both_markers() {
        let (dir, manager, _bus) = manager().await;
        manager.login(&json!({"id": "u1"})).await;
        manager.logout().await;

        assert!(manager.current_user().await.is_none());
        let store = PersistentStore::open(dir.path()).await;
        assert!(store.get(KEY_SESSION_TOKEN).await.is_none());
    }

    #[tokio::test]
    async fn test_login_and_logout_are_announced() {
        let (_dir, manager, bus) = manager().await;
        let mut login_rx = bus.subscribe(TOPIC_SESSION_LOGIN);
        let mut logout_rx = bus.subscribe(TOPIC_SESSION_LOGOUT);

        manager.login(&json!({"id": "u1"})).await;
        assert!(!login_rx.recv().await.unwrap().is_empty());

        manager.logout().await;
        assert_eq!(logout_rx.recv().await.unwrap(), "");
    }
}
