//! StayChill API HTTP dispatcher

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::warn;

use crate::config::ApiConfig;
use crate::error::{ApiError, Result};
use crate::retry::{backoff_delay, RetryPolicy};
use crate::token::TokenProvider;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const SLOW_REQUEST: Duration = Duration::from_millis(500);

/// Per-call dispatch options
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    pub retry: RetryPolicy,
    pub force_token_refresh: bool,
}

/// Client for the StayChill REST API
///
/// Wraps a shared `reqwest::Client` with bearer-token authentication, retry
/// with exponential backoff, and a hard request timeout. Responses that the
/// backend rejects are normalized to `"<status>: <message>"` errors.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl ApiClient {
    /// Create a client with the default 10 second timeout
    pub fn new(base_url: &str, tokens: Arc<dyn TokenProvider>) -> Self {
        Self::with_timeout(base_url, tokens, DEFAULT_TIMEOUT)
    }

    /// Create a client from environment configuration
    pub fn from_config(config: &ApiConfig, tokens: Arc<dyn TokenProvider>) -> Self {
        Self::with_timeout(
            &config.base_url,
            tokens,
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Create a client with a custom timeout
    pub fn with_timeout(
        base_url: &str,
        tokens: Arc<dyn TokenProvider>,
        timeout: Duration,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    /// GET a JSON resource with the default retry policy
    pub async fn get(&self, path: &str) -> Result<Value> {
        self.send(Method::GET, path, None, &DispatchOptions::default())
            .await
    }

    /// Dispatch a request, retrying failures with exponential backoff until
    /// the policy gives up. The final error is returned to the caller,
    /// never swallowed.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        options: &DispatchOptions,
    ) -> Result<Value> {
        let mut attempt = 0u32;
        loop {
            match self.send_once(method.clone(), path, body, options).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !options.retry.should_retry(&err, attempt) {
                        return Err(err);
                    }
                    let delay = backoff_delay(attempt);
                    warn!(
                        %method,
                        path,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn send_once(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        options: &DispatchOptions,
    ) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let is_get = method == Method::GET;
        let mut request = self.http.request(method, &url);

        // Defeat intermediate HTTP caches; freshness is governed entirely by
        // the application-level caches.
        if is_get {
            let bust = chrono::Utc::now().timestamp_millis().to_string();
            request = request.query(&[("cache", bust.as_str())]);
        }

        if let Some(token) = self.tokens.token(options.force_token_refresh).await {
            request = request.bearer_auth(token);
        }
        if !is_get {
            if let Some(csrf) = self.tokens.csrf_token() {
                request = request.header("X-CSRF-Token", csrf);
            }
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let started = Instant::now();
        let response = request.send().await.map_err(ApiError::from)?;
        if cfg!(debug_assertions) && started.elapsed() > SLOW_REQUEST {
            warn!(
                url = %url,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Slow request"
            );
        }

        let status = response.status();
        if !status.is_success() {
            let message = read_error_message(response).await;
            return Err(ApiError::from_status(status.as_u16(), message));
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        response.json().await.map_err(ApiError::from)
    }
}

/// Extract a human-readable message from an error response.
///
/// Prefers a structured JSON body (`message` or `error` field), falls back
/// to the raw text, then to the canonical status description.
async fn read_error_message(response: reqwest::Response) -> String {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    if let Ok(json) = serde_json::from_str::<Value>(&text) {
        if let Some(msg) = json
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| json.get("error").and_then(Value::as_str))
        {
            return msg.to_string();
        }
    }

    let text = text.trim();
    if !text.is_empty() {
        return text.to_string();
    }
    status.canonical_reason().unwrap_or("request failed").to_string()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;
    use crate::error::ErrorKind;
    use crate::token::AnonymousTokens;

    /// Serve one canned HTTP response per connection, chosen by hit count.
    async fn spawn_server(respond: fn(usize) -> String) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_server = hits.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let hit = hits_server.fetch_add(1, Ordering::SeqCst);
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(respond(hit).as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}", addr), hits)
    }

    fn http_response(status_line: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        )
    }

    fn client(base_url: &str) -> ApiClient {
        ApiClient::new(base_url, Arc::new(AnonymousTokens))
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = client("http://localhost:3000/");
        assert_eq!(client.base_url, "http://localhost:3000");
    }

    #[tokio::test]
    async fn test_get_parses_json_body() {
        let (base, hits) =
            spawn_server(|_| http_response("200 OK", r#"{"status":"ok"}"#)).await;
        let value = client(&base).get("/api/health").await.unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_server_error_normalized_without_retry() {
        let (base, hits) =
            spawn_server(|_| http_response("500 Internal Server Error", r#"{"message":"boom happened"}"#))
                .await;
        let options = DispatchOptions {
            retry: RetryPolicy::none(),
            ..Default::default()
        };
        let err = client(&base)
            .send(Method::GET, "/api/bookings", None, &options)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Server);
        assert_eq!(err.to_string(), "500: boom happened");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_field_fallback() {
        let (base, _hits) =
            spawn_server(|_| http_response("400 Bad Request", r#"{"error":"dates overlap"}"#)).await;
        let options = DispatchOptions {
            retry: RetryPolicy::none(),
            ..Default::default()
        };
        let err = client(&base)
            .send(Method::GET, "/api/bookings", None, &options)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Request);
        assert_eq!(err.to_string(), "400: dates overlap");
    }

    #[tokio::test]
    async fn test_plain_text_error_body() {
        let (base, _hits) = spawn_server(|_| {
            "HTTP/1.1 503 Service Unavailable\r\ncontent-type: text/plain\r\ncontent-length: 11\r\nconnection: close\r\n\r\nmaintenance"
                .to_string()
        })
        .await;
        let options = DispatchOptions {
            retry: RetryPolicy::none(),
            ..Default::default()
        };
        let err = client(&base)
            .send(Method::GET, "/api/properties", None, &options)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "503: maintenance");
    }

    #[tokio::test]
    async fn test_unauthorized_not_retried_for_auth_probe() {
        let (base, hits) =
            spawn_server(|_| http_response("401 Unauthorized", r#"{"error":"unauthorized"}"#)).await;
        let options = DispatchOptions {
            retry: RetryPolicy::no_auth_retry(),
            ..Default::default()
        };
        let err = client(&base)
            .send(Method::GET, "/api/me", None, &options)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unauthorized);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_with_increasing_delay_then_succeeds() {
        // Fails twice, succeeds on the third attempt: two backoff delays
        // (1s then 2s) must elapse.
        let (base, hits) = spawn_server(|hit| {
            if hit < 2 {
                http_response("500 Internal Server Error", r#"{"message":"boom"}"#)
            } else {
                http_response("200 OK", r#"{"status":"ok"}"#)
            }
        })
        .await;

        let started = Instant::now();
        let value = client(&base).get("/api/properties").await.unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_millis(3000));
    }

    #[tokio::test]
    async fn test_permanent_failure_exhausts_retries() {
        // Always 500: the default policy gives up after the initial attempt
        // plus three retries and surfaces the server classification.
        let (base, hits) =
            spawn_server(|_| http_response("500 Internal Server Error", r#"{"message":"boom"}"#))
                .await;

        let err = client(&base).get("/api/bookings").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Server);
        assert_eq!(err.to_string(), "500: boom");
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_unanswered_request_classified_as_timeout() {
        // Accepts the connection, never responds
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    let _held_open = socket;
                    tokio::time::sleep(Duration::from_secs(60)).await;
                });
            }
        });

        let client = ApiClient::with_timeout(
            &base,
            Arc::new(AnonymousTokens),
            Duration::from_millis(200),
        );
        let options = DispatchOptions {
            retry: RetryPolicy::none(),
            ..Default::default()
        };
        let err = client
            .send(Method::GET, "/api/slow", None, &options)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Timeout);
        assert_eq!(err.to_string(), "request timed out");
    }

    #[tokio::test]
    async fn test_connection_failure_classified() {
        // Nothing listens on this port; bind-then-drop reserves a dead one.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let options = DispatchOptions {
            retry: RetryPolicy::none(),
            ..Default::default()
        };
        let err = client(&base)
            .send(Method::GET, "/api/health", None, &options)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Connection);
    }
}
