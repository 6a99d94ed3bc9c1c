//! Client configuration parsed from environment variables

use std::env;

/// Configuration for the dispatcher and the durable cache location
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub cache_dir: String,
}

impl ApiConfig {
    /// Parse configuration from environment variables, with local-dev
    /// defaults.
    pub fn from_env() -> Self {
        let base_url = env::var("STAYCHILL_API_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        let timeout_secs = env::var("STAYCHILL_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        let cache_dir =
            env::var("STAYCHILL_CACHE_DIR").unwrap_or_else(|_| ".staychill-cache".to_string());

        Self {
            base_url,
            timeout_secs,
            cache_dir,
        }
    }
}
