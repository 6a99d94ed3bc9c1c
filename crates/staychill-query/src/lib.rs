//! Query cache and request orchestration for the StayChill client
//!
//! Sits between UI code and the REST API: resolves a resource key against
//! the in-memory cache, then the durable store, then the network — with
//! concurrent requests for the same key coalesced onto one in-flight fetch,
//! and successful mutations invalidating the reads they affect.

mod client;
mod error;
mod key;
mod policy;

pub use client::{QueryClient, QueryConfig};
pub use error::{QueryError, Result};
pub use key::ResourceKey;
pub use policy::{invalidation_targets, stale_time_for};
