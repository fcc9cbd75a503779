//! Core data types for intercepted requests, responses, and edge errors.

use serde::{Deserialize, Serialize};

/// A request seen at the interception point. Immutable for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterceptedRequest {
    pub method: String,
    /// Absolute URL of the resource.
    pub url: String,
    pub headers: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub body: Vec<u8>,
}

impl InterceptedRequest {
    /// Build a GET request with no headers.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Add a header, returning the request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace the method, returning the request.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Case-insensitive header lookup (first match wins).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }
}

/// A response produced by the network or replayed from the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl EdgeResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Add a header, returning the response.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// True for any 2xx status.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Only exact 200 responses may be written to a cache.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200
    }
}

/// Errors that can occur in the edge library.
#[derive(thiserror::Error, Debug)]
pub enum EdgeError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Timed out after {timeout_ms} ms: {url}")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Pre-cache failed for {url}: {reason}")]
    Precache { url: String, reason: String },
}

impl From<reqwest::Error> for EdgeError {
    fn from(e: reqwest::Error) -> Self {
        EdgeError::Network(e.to_string())
    }
}

/// Convenience result type.
pub type EdgeResult<T> = Result<T, EdgeError>;
