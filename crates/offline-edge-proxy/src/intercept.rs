//! Conversion between HTTP messages and edge requests/responses.

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::Response;
use url::Url;

use offline_edge::{EdgeResponse, InterceptedRequest, ServedFrom};

use crate::config::origin_target;
use crate::types::ProxyResult;

/// Response header naming where the answer came from.
pub const SOURCE_HEADER: &str = "x-edge-source";

/// Headers that describe a single connection, never copied across.
const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
];

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

/// Build the intercepted request for an incoming message.
///
/// The URL is the incoming path and query placed on the origin, so a
/// target can never name another host.
pub fn to_intercepted(
    origin: &Url,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Vec<u8>,
) -> ProxyResult<InterceptedRequest> {
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let url = origin_target(origin, path_and_query);

    let headers = headers
        .iter()
        .filter(|(name, _)| name.as_str() != "host" && !is_hop_by_hop(name.as_str()))
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    Ok(InterceptedRequest {
        method: method.as_str().to_string(),
        url: url.to_string(),
        headers,
        body,
    })
}

/// Turn an edge response into an HTTP response.
///
/// Headers that are not valid HTTP are dropped.
pub fn into_http(response: EdgeResponse, served_from: ServedFrom) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);

    let mut http = Response::new(Body::from(response.body));
    *http.status_mut() = status;

    let headers = http.headers_mut();
    for (name, value) in &response.headers {
        if is_hop_by_hop(name) {
            continue;
        }
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => tracing::debug!("dropping invalid header {name:?}"),
        }
    }
    if let Ok(value) = HeaderValue::from_str(&served_from.to_string()) {
        headers.insert(SOURCE_HEADER, value);
    }

    http
}

/// Response used when the edge has nothing to send.
pub fn no_response() -> Response {
    let mut http = Response::new(Body::empty());
    *http.status_mut() = StatusCode::BAD_GATEWAY;
    http
}
