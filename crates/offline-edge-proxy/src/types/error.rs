//! Error type for the proxy and its HTTP status mapping.

use axum::http::StatusCode;

/// All errors that can occur in the proxy.
#[derive(thiserror::Error, Debug)]
pub enum ProxyError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Edge error: {0}")]
    Edge(#[from] offline_edge::EdgeError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProxyError {
    /// HTTP status reported when this error ends a request.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            ProxyError::Edge(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Config(_)
            | ProxyError::Transport(_)
            | ProxyError::Io(_)
            | ProxyError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type ProxyResult<T> = Result<T, ProxyError>;
