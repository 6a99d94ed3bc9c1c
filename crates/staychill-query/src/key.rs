//! Resource keys

use std::fmt;

/// Markers identifying resources tied to the signed-in user. A session
/// change invalidates every cached key containing one of these.
pub(crate) const AUTH_SCOPED_MARKERS: [&str; 4] =
    ["/api/me", "user-profile", "my-bookings", "my-reservations"];

/// Ordered identifier for a logical resource.
///
/// The first segment is the request path; further segments discriminate
/// (an id, a filter, a page number):
///
/// ```
/// use staychill_query::ResourceKey;
///
/// let key = ResourceKey::new("/api/properties").with_arg(42);
/// assert_eq!(key.to_string(), "/api/properties/42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    segments: Vec<String>,
}

impl ResourceKey {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            segments: vec![path.into()],
        }
    }

    /// Append a discriminating segment.
    pub fn with_arg(mut self, arg: impl ToString) -> Self {
        self.segments.push(arg.to_string());
        self
    }

    /// Leading segment, used for prefix-based invalidation.
    pub fn path(&self) -> &str {
        &self.segments[0]
    }

    /// Request path sent to the dispatcher.
    pub fn request_path(&self) -> String {
        self.to_string()
    }

    /// Key under which this resource is stored durably.
    pub fn storage_key(&self) -> String {
        staychill_store::storage_key_for(&self.to_string())
    }

    /// Whether this resource is tied to the signed-in user.
    pub fn is_auth_scoped(&self) -> bool {
        let key = self.to_string();
        AUTH_SCOPED_MARKERS.iter().any(|m| key.contains(m))
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}
