//! StayChill REST API client
//!
//! Dispatches HTTP requests to the StayChill backend with bearer-token
//! authentication, retry with exponential backoff, a hard request timeout,
//! and normalized error classification.

mod client;
mod config;
mod error;
mod retry;
mod token;

pub use client::{ApiClient, DispatchOptions};
pub use config::ApiConfig;
pub use error::{ApiError, ErrorKind, Result};
pub use retry::{backoff_delay, RetryPolicy};
pub use token::{AnonymousTokens, TokenProvider};

pub use reqwest::Method;
