//! HTTP transport for the demo JSON APIs.
//!
//! One request per call, JSON in and out, exactly one success-or-failure
//! outcome per call. Retry policy lives entirely in the poll loops — this
//! module never retries.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Errors a single transport call can produce.
///
/// Each variant carries enough context to diagnose the failure without
/// needing to inspect the originating error directly.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server replied with a status other than 200.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },
    /// The request exceeded the configured timeout.
    #[error("request to {url} timed out")]
    Timeout { url: String },
    /// A TCP-level connection could not be established.
    #[error("connection failed to {url}: {detail}")]
    Connect { url: String, detail: String },
    /// Response body could not be parsed as the expected JSON structure.
    #[error("JSON parse error from {url}: {detail}")]
    Json { url: String, detail: String },
}

impl TransportError {
    /// The numeric status code for HTTP failures, `None` otherwise.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Configuration for an [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Base URL of the demo API (e.g. `http://127.0.0.1:8080`).
    pub base_url: String,
    /// TCP connection timeout.
    pub connect_timeout: Duration,
    /// Per-request timeout; expiry surfaces as [`TransportError::Timeout`].
    pub request_timeout: Duration,
}

impl ApiClientConfig {
    /// Create a config with the defaults the hosting pages used.
    ///
    /// - connect_timeout: 3 s
    /// - request_timeout: 30 s
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            connect_timeout: Duration::from_secs(3),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// JSON HTTP client for the slash and game APIs.
///
/// Construct via [`ApiClient::builder`]. All methods resolve to exactly one
/// outcome: a parsed payload, "no payload" (`Ok(None)` on an empty 200
/// body), or a [`TransportError`].
#[derive(Debug, Clone)]
pub struct ApiClient {
    config: ApiClientConfig,
    client: reqwest::Client,
}

impl ApiClient {
    /// Start building a client aimed at `base_url`.
    pub fn builder(base_url: impl Into<String>) -> ApiClientBuilder {
        ApiClientBuilder::new(base_url)
    }

    /// The configured base URL.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Issue a GET request and parse the JSON response.
    ///
    /// A cache-busting `nocache=<unix millis>` query parameter is appended,
    /// matching what the hosting pages sent.
    ///
    /// # Returns
    /// - `Ok(Some(T))` — 200 with a parseable non-empty body.
    /// - `Ok(None)` — 200 with an empty body.
    /// - `Err(TransportError)` — anything else, exactly once.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, TransportError> {
        let url = self.url_for(&cache_busted(path, now_millis()));
        let request = self.client.get(&url);
        self.execute(request, url).await
    }

    /// Issue a POST request with a JSON body and parse the JSON response.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<Option<T>, TransportError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url_for(path);
        let request = self.client.post(&url).json(body);
        self.execute(request, url).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        url: String,
    ) -> Result<Option<T>, TransportError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout { url: url.clone() }
            } else {
                TransportError::Connect {
                    url: url.clone(),
                    detail: e.to_string(),
                }
            }
        })?;

        // The demo servers signal success with a bare 200; anything else
        // (including other 2xx codes) is the failure path.
        let status = response.status().as_u16();
        if status != 200 {
            return Err(TransportError::Http { status, url });
        }

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout { url: url.clone() }
            } else {
                TransportError::Connect {
                    url: url.clone(),
                    detail: e.to_string(),
                }
            }
        })?;

        if bytes.is_empty() {
            return Ok(None);
        }

        serde_json::from_slice::<T>(&bytes)
            .map(Some)
            .map_err(|e| TransportError::Json {
                url,
                detail: e.to_string(),
            })
    }

    fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Append the cache-busting query parameter the hosting pages used on GETs.
fn cache_busted(path: &str, millis: u128) -> String {
    let sep = if path.contains('?') { '&' } else { '?' };
    format!("{path}{sep}nocache={millis}")
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Builder for [`ApiClient`].
///
/// # Example
/// ```rust,ignore
/// let api = ApiClient::builder("http://127.0.0.1:8080")
///     .request_timeout(Duration::from_secs(30))
///     .build();
/// ```
pub struct ApiClientBuilder {
    config: ApiClientConfig,
}

impl ApiClientBuilder {
    /// Create a builder targeting `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            config: ApiClientConfig::new(base_url),
        }
    }

    /// Override the TCP connect timeout (default 3 s).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Override the per-request timeout (default 30 s).
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Consume the builder and construct an [`ApiClient`].
    pub fn build(self) -> ApiClient {
        // reqwest::Client::builder() can fail in extreme environments, but
        // unwrap_or_default() falls back to a default client instead of panicking.
        let client = reqwest::Client::builder()
            .connect_timeout(self.config.connect_timeout)
            .timeout(self.config.request_timeout)
            .build()
            .unwrap_or_default();

        ApiClient {
            config: self.config,
            client,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
