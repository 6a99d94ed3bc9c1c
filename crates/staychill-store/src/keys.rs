//! Well-known storage keys and namespacing

/// Cached projection of the signed-in user
pub const KEY_AUTH_USER: &str = "staychill_auth_user";
/// Session marker written on login, removed on logout
pub const KEY_SESSION_TOKEN: &str = "staychill_session_token";
pub const KEY_FEATURED_PROPERTIES: &str = "staychill_featured_properties";
pub const KEY_FEATURED_RESTAURANTS: &str = "staychill_featured_restaurants";
/// Prefix for the last-fetch markers kept alongside each entry
pub const LAST_FETCH_PREFIX: &str = "staychill_last_fetch_";

/// Prefixes this application owns; [`clear_all`](crate::PersistentStore::clear_all)
/// never touches anything else.
pub const NAMESPACE_PREFIXES: [&str; 2] = ["staychill_", "cache_"];

/// Map a logical resource path to its durable storage key.
///
/// A handful of hot resources keep their historical short keys; everything
/// else goes under the generic `cache_` namespace.
pub fn storage_key_for(resource: &str) -> String {
    match resource {
        "/api/me" => KEY_AUTH_USER.to_string(),
        "/api/properties/featured" => KEY_FEATURED_PROPERTIES.to_string(),
        "/api/restaurants/featured" => KEY_FEATURED_RESTAURANTS.to_string(),
        _ => format!("cache_{}", resource),
    }
}

pub(crate) fn in_namespace(key: &str) -> bool {
    NAMESPACE_PREFIXES.iter().any(|p| key.starts_with(p))
}

/// Whether `storage_key` holds a resource under `resource_prefix`.
///
/// Covers both the generic `cache_` namespace and the well-known short
/// keys, which would otherwise escape prefix-based invalidation.
pub fn key_matches_resource(storage_key: &str, resource_prefix: &str) -> bool {
    if let Some(resource) = storage_key.strip_prefix("cache_") {
        return resource.starts_with(resource_prefix);
    }
    match storage_key {
        KEY_AUTH_USER => "/api/me".starts_with(resource_prefix),
        KEY_FEATURED_PROPERTIES => "/api/properties/featured".starts_with(resource_prefix),
        KEY_FEATURED_RESTAURANTS => "/api/restaurants/featured".starts_with(resource_prefix),
        _ => false,
    }
}
