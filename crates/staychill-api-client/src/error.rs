//! Error types and classification for the API client

use std::fmt;

/// Upper bound on messages shown directly to users
const USER_MESSAGE_MAX: usize = 100;

/// Classification of a failed request, independent of any UI concern.
///
/// The kind decides which recovery affordance the caller offers: a
/// re-authentication prompt for [`ErrorKind::Unauthorized`], a retry button
/// for the transient kinds, a generic message for the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 401/403: the session is missing or not allowed
    Unauthorized,
    /// 5xx: the backend failed
    Server,
    /// The host could not be reached at all
    Connection,
    /// The request exceeded its deadline and was aborted
    Timeout,
    /// Anything else (bad request, parse failure, ...)
    Request,
}

/// Error produced by the dispatcher after classification and normalization
#[derive(Debug, Clone)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl ApiError {
    /// Classify a non-2xx response by status code, regardless of message.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            401 | 403 => ErrorKind::Unauthorized,
            500..=599 => ErrorKind::Server,
            _ => ErrorKind::Request,
        };
        Self {
            kind,
            status: Some(status),
            message: message.into(),
        }
    }

    /// Message suitable for direct display, truncated so verbose backend
    /// detail never reaches the user.
    pub fn user_message(&self) -> String {
        truncate(&self.to_string(), USER_MESSAGE_MAX)
    }
}

/// Truncate `message` to at most `max` characters.
pub(crate) fn truncate(message: &str, max: usize) -> String {
    if message.chars().count() <= max {
        message.to_string()
    } else {
        message.chars().take(max).collect()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{}: {}", status, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self {
                kind: ErrorKind::Timeout,
                status: None,
                message: "request timed out".to_string(),
            }
        } else if err.is_connect() {
            Self {
                kind: ErrorKind::Connection,
                status: None,
                message: format!("connection failed: {err}"),
            }
        } else {
            Self {
                kind: ErrorKind::Request,
                status: err.status().map(|s| s.as_u16()),
                message: err.to_string(),
            }
        }
    }
}

/// Result type for dispatcher operations
pub type Result<T> = std::result::Result<T, ApiError>;
