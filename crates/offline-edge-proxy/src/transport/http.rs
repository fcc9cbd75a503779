//! HTTP transport: intercepting axum server with a health endpoint.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::{IntoResponse, Json as AxumJson, Response};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use offline_edge::{CacheStore, EnvironmentSignals};

use crate::app::EdgeApp;
use crate::intercept::{into_http, no_response, to_intercepted};
use crate::types::{ProxyError, ProxyResult};

/// Health route, kept out of the origin's namespace.
pub const HEALTH_PATH: &str = "/__edge/health";

/// Build the router: health check plus a catch-all interceptor.
pub fn router(app: Arc<EdgeApp>) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(handle_health))
        .fallback(handle_intercept)
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

/// HTTP transport serving one edge app.
pub struct HttpTransport {
    app: Arc<EdgeApp>,
}

impl HttpTransport {
    pub fn new(app: Arc<EdgeApp>) -> Self {
        Self { app }
    }

    /// Run the HTTP server on the given address until Ctrl-C.
    pub async fn run(&self, addr: &str) -> ProxyResult<()> {
        let app = router(self.app.clone());

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(ProxyError::Io)?;

        tracing::info!(
            "Edge listening on http://{addr} for {}",
            self.app.origin()
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ProxyError::Transport(e.to_string()))?;

        tracing::info!("Edge stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

/// Intercept any request and answer it through the edge worker.
async fn handle_intercept(
    State(app): State<Arc<EdgeApp>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = match to_intercepted(app.origin(), &method, &uri, &headers, body.to_vec()) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!("cannot intercept {uri}: {e}");
            return (e.status_code(), e.to_string()).into_response();
        }
    };

    let id = uuid::Uuid::new_v4();
    let span = tracing::info_span!(
        "intercept",
        %id,
        method = %request.method,
        url = %request.url
    );

    async move {
        let signals = EnvironmentSignals::from_request(&request);
        match app.worker().handle_with_source(&request, &signals).await {
            Some((response, served_from)) => {
                tracing::debug!(status = response.status, %served_from, "served");
                into_http(response, served_from)
            }
            None => {
                tracing::warn!("no response available");
                no_response()
            }
        }
    }
    .instrument(span)
    .await
}

/// Health check endpoint.
async fn handle_health(State(app): State<Arc<EdgeApp>>) -> AxumJson<serde_json::Value> {
    AxumJson(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "origin": app.origin().as_str(),
        "cache": app.config().cache_name,
        "entries": app.worker().store().len(),
    }))
}
