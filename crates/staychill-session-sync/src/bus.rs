//! Topic-based pub/sub bus
//!
//! A thin fan-out layer over broadcast channels. Delivery is asynchronous
//! and best-effort: publishing with no subscribers is not an error, and a
//! lagging subscriber drops the oldest events rather than blocking the
//! publisher.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::debug;

/// Another view of the application started a session
pub const TOPIC_SESSION_LOGIN: &str = "session/login";
/// Another view of the application ended its session
pub const TOPIC_SESSION_LOGOUT: &str = "session/logout";

const CHANNEL_CAPACITY: usize = 16;

/// Cloneable handle to a topic-keyed broadcast bus
#[derive(Clone, Default)]
pub struct Bus {
    topics: Arc<Mutex<HashMap<String, broadcast::Sender<String>>>>,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<String> {
        let mut topics = self.topics.lock().expect("bus lock poisoned");
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Publish `payload` on `topic`. Returns the number of subscribers the
    /// event was delivered to.
    pub fn publish(&self, topic: &str, payload: &str) -> usize {
        let delivered = self.sender(topic).send(payload.to_string()).unwrap_or(0);
        debug!(topic, delivered, "Published event");
        delivered
    }

    /// Subscribe to `topic`. Events published before this call are not
    /// replayed.
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<String> {
        self.sender(topic).subscribe()
    }
}
