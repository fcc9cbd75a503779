//! Transport layer for the edge.

pub mod http;

pub use http::{router, HttpTransport, HEALTH_PATH};
