//! HTTP plumbing shared by content providers and delegation clients.
//!
//! [`HttpTransport`] is the seam delegation clients talk through. The native
//! implementation is [`HttpClient`], a thin wrapper over `reqwest`; other
//! execution environments (or tests) can plug in their own.
//!
//! Content-host GETs are idempotent and retried with exponential backoff on
//! transport errors and 5xx replies. Delegation POSTs are sent once.

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Duration;
use thiserror::Error;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Attempts made for one GET, including the first.
pub const GET_ATTEMPTS: usize = 3;

/// Errors below the HTTP status level.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request failed: {0}")]
    Request(String),
}

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }

    /// Header value as text, if present and printable.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Outbound POST capability used by delegation clients.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// POST `body` as JSON and read the full response.
    async fn post_json(&self, url: &str, body: &JsonValue) -> Result<HttpResponse, TransportError>;
}

/// Client settings.
#[derive(Debug, Clone, Copy)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub verify_ssl: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            verify_ssl: true,
        }
    }
}

/// Native transport backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    timeout: Duration,
}

/// Outcome of one GET attempt that should be retried.
#[derive(Debug)]
enum RetryableGet {
    Transport(TransportError),
    Server(HttpResponse),
}

impl HttpClient {
    pub fn new(config: HttpConfig) -> Result<Self, TransportError> {
        if !config.verify_ssl {
            tracing::warn!("TLS certificate verification is disabled");
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .user_agent(concat!("checkr/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self {
            client,
            timeout: config.timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// GET `url`, retrying transport errors and 5xx replies.
    ///
    /// Non-2xx replies are returned as responses, not errors; the last 5xx
    /// reply is returned once attempts run out.
    pub async fn get(&self, url: &str, headers: &HeaderMap) -> Result<HttpResponse, TransportError> {
        let client = &self.client;
        let timeout = self.timeout;

        let attempt = || async move {
            let response = client
                .get(url)
                .headers(headers.clone())
                .send()
                .await
                .map_err(|e| RetryableGet::Transport(classify(e, timeout)))?;
            let response = read_response(response, timeout)
                .await
                .map_err(RetryableGet::Transport)?;

            if response.status >= 500 {
                Err(RetryableGet::Server(response))
            } else {
                Ok(response)
            }
        };

        let outcome = attempt
            .retry(backoff())
            .notify(|e: &RetryableGet, delay: Duration| {
                let reason = match e {
                    RetryableGet::Transport(t) => t.to_string(),
                    RetryableGet::Server(r) => format!("HTTP {}", r.status),
                };
                tracing::debug!(url = %url, reason = %reason, ?delay, "Retrying GET");
            })
            .await;

        match outcome {
            Ok(response) | Err(RetryableGet::Server(response)) => Ok(response),
            Err(RetryableGet::Transport(e)) => Err(e),
        }
    }
}

#[async_trait]
impl HttpTransport for HttpClient {
    async fn post_json(&self, url: &str, body: &JsonValue) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| classify(e, self.timeout))?;
        read_response(response, self.timeout).await
    }
}

fn backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(2))
        .with_max_times(GET_ATTEMPTS - 1)
}

async fn read_response(
    response: reqwest::Response,
    timeout: Duration,
) -> Result<HttpResponse, TransportError> {
    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let body = response.text().await.map_err(|e| classify(e, timeout))?;
    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

fn classify(error: reqwest::Error, timeout: Duration) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(timeout)
    } else if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else {
        TransportError::Request(error.to_string())
    }
}
