//! Query-layer errors

use std::fmt;

use staychill_api_client::{ApiError, ErrorKind};

use crate::key::ResourceKey;

/// Upper bound on messages shown directly to users
const USER_MESSAGE_MAX: usize = 100;

/// Error surfaced to callers after the dispatcher has exhausted retries.
///
/// Carries the originating key: re-issuing `load` for that key is the
/// retry affordance, and is always safe under de-duplication.
#[derive(Debug, Clone)]
pub struct QueryError {
    pub kind: ErrorKind,
    pub message: String,
    pub key: ResourceKey,
}

impl QueryError {
    pub(crate) fn from_api(key: &ResourceKey, error: ApiError) -> Self {
        Self {
            kind: error.kind,
            message: error.to_string(),
            key: key.clone(),
        }
    }

    pub(crate) fn abandoned(key: &ResourceKey) -> Self {
        Self {
            kind: ErrorKind::Request,
            message: "request abandoned before completion".to_string(),
            key: key.clone(),
        }
    }

    /// Message suitable for direct display, truncated so verbose backend
    /// detail never reaches the user.
    pub fn user_message(&self) -> String {
        if self.message.chars().count() <= USER_MESSAGE_MAX {
            self.message.clone()
        } else {
            self.message.chars().take(USER_MESSAGE_MAX).collect()
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for QueryError {}

/// Result type for query operations
pub type Result<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_carries_classification_and_key() {
        let key = ResourceKey::new("/api/bookings").with_arg("b7");
        let err = QueryError::from_api(&key, ApiError::from_status(500, "boom"));
        assert_eq!(err.kind, ErrorKind::Server);
        assert_eq!(err.message, "500: boom");
        assert_eq!(err.key, key);
    }

    #[test]
    fn test_user_message_truncates() {
        let key = ResourceKey::new("/api/bookings");
        let err = QueryError::from_api(&key, ApiError::from_status(500, "y".repeat(400)));
        assert_eq!(err.user_message().chars().count(), 100);
    }
}
