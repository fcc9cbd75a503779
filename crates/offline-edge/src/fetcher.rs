//! Network access: the `Fetcher` trait and its reqwest-backed client.
//!
//! One request, one attempt. No retries, no protocol fallback.

use std::time::Duration;

use async_trait::async_trait;

use crate::types::{EdgeError, EdgeResponse, EdgeResult, InterceptedRequest};

/// Default per-request timeout for plain network fetches.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Request headers never forwarded upstream.
const SKIPPED_REQUEST_HEADERS: [&str; 8] = [
    "host",
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    "te",
    "content-length",
];

/// Something that can perform a network request.
///
/// `Err` means the request was rejected (connection failure, timeout,
/// cancellation); any status the server returned is an `Ok` response.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &InterceptedRequest) -> EdgeResult<EdgeResponse>;
}

/// HTTP client for the edge, wrapping reqwest.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    /// Create a client with the given request timeout.
    pub fn new(timeout_ms: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(concat!("offline-edge/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            client,
            timeout: Duration::from_millis(timeout_ms),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT_MS)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &InterceptedRequest) -> EdgeResult<EdgeResponse> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| EdgeError::Network(format!("invalid method {}: {e}", request.method)))?;
        let url = url::Url::parse(&request.url)?;

        let mut builder = self.client.request(method, url).timeout(self.timeout);
        for (name, value) in &request.headers {
            if SKIPPED_REQUEST_HEADERS
                .iter()
                .any(|skip| name.eq_ignore_ascii_case(skip))
            {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let r = builder.send().await?;
        let status = r.status().as_u16();

        let headers: Vec<(String, String)> = r
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();

        let body = r.bytes().await?.to_vec();

        tracing::debug!("{} {} -> {status}", request.method, request.url);

        Ok(EdgeResponse {
            status,
            headers,
            body,
        })
    }
}
