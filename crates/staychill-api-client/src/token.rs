//! Credential seam for the dispatcher

use async_trait::async_trait;

/// Supplies credentials attached to outgoing requests.
///
/// Implemented by the identity-provider integration; tests and anonymous
/// sessions use [`AnonymousTokens`].
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Current bearer token, refreshed upstream when `force_refresh` is set.
    /// `None` means the session is anonymous and no header is attached.
    async fn token(&self, force_refresh: bool) -> Option<String>;

    /// CSRF token for mutating requests.
    ///
    /// CSRF enforcement is not implemented on the backend yet, so the
    /// default returns `None` and the dispatcher omits the header. Do not
    /// synthesize a value here; wire a real token source when the backend
    /// starts validating it.
    fn csrf_token(&self) -> Option<String> {
        None
    }
}

/// Provider for unauthenticated sessions: no bearer token, no CSRF token.
pub struct AnonymousTokens;

#[async_trait]
impl TokenProvider for AnonymousTokens {
    async fn token(&self, _force_refresh: bool) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_anonymous_provider_has_no_credentials() {
        let tokens = AnonymousTokens;
        assert!(tokens.token(false).await.is_none());
        assert!(tokens.token(true).await.is_none());
        assert!(tokens.csrf_token().is_none());
    }
}
