//! Staleness policy and mutation invalidation graph
//!
//! Pure, process-wide tables: a resource prefix maps to a cache lifetime,
//! and a mutated resource maps to the read prefixes it makes stale. No
//! side effects; same key, same answer.

use std::time::Duration;

use crate::key::ResourceKey;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * 60;

/// Identity rarely changes mid-session
pub const STALE_SESSION: Duration = Duration::from_secs(24 * HOUR);
pub const STALE_PROFILE: Duration = Duration::from_secs(6 * HOUR);
/// Active transactions move fast
pub const STALE_TRANSACTIONAL: Duration = Duration::from_secs(2 * MINUTE);
/// Curated subsets change rarely relative to read volume
pub const STALE_FEATURED: Duration = Duration::from_secs(2 * HOUR);
pub const STALE_CATALOG: Duration = Duration::from_secs(30 * MINUTE);
pub const STALE_DEFAULT: Duration = Duration::from_secs(15 * MINUTE);

/// Cache lifetime for a resource.
pub fn stale_time_for(key: &ResourceKey) -> Duration {
    let key = key.to_string();
    if key.starts_with("/api/me") {
        STALE_SESSION
    } else if key.contains("user-profile") {
        STALE_PROFILE
    } else if key.contains("booking") || key.contains("reservation") {
        STALE_TRANSACTIONAL
    } else if key.contains("featured") {
        STALE_FEATURED
    } else if key.starts_with("/api/properties") || key.starts_with("/api/restaurants") {
        STALE_CATALOG
    } else {
        STALE_DEFAULT
    }
}

/// Read prefixes a successful mutation under `mutated` makes stale, beyond
/// the mutated prefix itself.
///
/// One table instead of per-call-site invalidation: every mutation path
/// invalidates the same dependent reads.
pub fn invalidation_targets(mutated: &ResourceKey) -> &'static [&'static str] {
    let key = mutated.to_string();
    if key.contains("booking") {
        // A booking changes availability on the property it reserves
        &["/api/bookings", "/api/my-bookings", "/api/properties"]
    } else if key.contains("reservation") {
        &["/api/reservations", "/api/my-reservations", "/api/restaurants"]
    } else if key.starts_with("/api/me") || key.contains("user-profile") {
        &["/api/me", "/api/user-profile"]
    } else {
        &[]
    }
}
