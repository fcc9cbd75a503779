//! offline-edge-proxy: intercepting HTTP edge in front of an origin site.

pub mod app;
pub mod config;
pub mod intercept;
pub mod transport;
pub mod types;

pub use app::EdgeApp;
pub use config::{resolve_config_path, ProxyConfig};
pub use transport::HttpTransport;
pub use types::{ProxyError, ProxyResult};
