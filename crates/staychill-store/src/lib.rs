//! Durable key/value cache for the StayChill client
//!
//! Stores JSON payloads on disk with an absolute expiry timestamp and a
//! parallel last-fetch marker, so cached server state survives restarts.
//! Expired entries are evicted lazily on read. Storage failures degrade to
//! cache misses: the store is an optimization, never a correctness
//! dependency.

mod keys;
mod store;
mod types;

pub use keys::{
    key_matches_resource, storage_key_for, KEY_AUTH_USER, KEY_FEATURED_PROPERTIES,
    KEY_FEATURED_RESTAURANTS, KEY_SESSION_TOKEN, LAST_FETCH_PREFIX, NAMESPACE_PREFIXES,
};
pub use store::PersistentStore;
pub use types::CacheEntry;
