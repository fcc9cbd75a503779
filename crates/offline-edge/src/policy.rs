//! Cache read-through policy: cache first for assets, network first for pages.
//!
//! ## Rules
//!
//! 1. A cached entry is served straight away unless the request is an HTML
//!    navigation.
//! 2. Otherwise the network is tried. A 200 is duplicated: one copy is
//!    written to the store on a detached task, the other is returned.
//! 3. A rejected or non-200 navigation gets the pre-cached offline page.
//!    A rejected asset request gets nothing; a non-200 asset response is
//!    passed through untouched.

use std::sync::Arc;

use crate::classify::is_navigation;
use crate::fetcher::Fetcher;
use crate::store::CacheStore;
use crate::types::{EdgeResponse, InterceptedRequest};

/// Where the answer to a request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
    OfflinePage,
}

/// Read-through cache in front of a fetcher.
pub struct CachePolicy {
    store: Arc<dyn CacheStore>,
    fetcher: Arc<dyn Fetcher>,
    /// Absolute URL of the offline fallback page.
    offline_url: String,
}

impl CachePolicy {
    pub fn new(
        store: Arc<dyn CacheStore>,
        fetcher: Arc<dyn Fetcher>,
        offline_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            fetcher,
            offline_url: offline_url.into(),
        }
    }

    pub fn offline_url(&self) -> &str {
        &self.offline_url
    }

    /// Answer a request. `None` means no usable response exists.
    pub async fn respond(&self, request: &InterceptedRequest) -> Option<EdgeResponse> {
        self.respond_with_source(request)
            .await
            .map(|(response, _)| response)
    }

    /// Like [`respond`](Self::respond), also reporting where the answer came from.
    pub async fn respond_with_source(
        &self,
        request: &InterceptedRequest,
    ) -> Option<(EdgeResponse, ResponseSource)> {
        let navigation = is_navigation(request);

        // The cache only ever holds GET responses.
        if request.is_get() && !navigation {
            if let Some(cached) = self.store.get(&request.url) {
                tracing::debug!("cache hit: {}", request.url);
                return Some((cached, ResponseSource::Cache));
            }
            tracing::debug!("cache miss: {}", request.url);
        }

        match self.fetcher.fetch(request).await {
            Ok(response) if response.is_cacheable() => {
                if request.is_get() {
                    self.store_in_background(&request.url, response.clone());
                }
                Some((response, ResponseSource::Network))
            }
            Ok(response) => {
                tracing::debug!("not caching {} (status {})", request.url, response.status);
                if navigation {
                    self.offline_page()
                } else {
                    Some((response, ResponseSource::Network))
                }
            }
            Err(e) => {
                tracing::warn!("network fetch failed for {}: {e}", request.url);
                if navigation {
                    self.offline_page()
                } else {
                    None
                }
            }
        }
    }

    fn offline_page(&self) -> Option<(EdgeResponse, ResponseSource)> {
        match self.store.get(&self.offline_url) {
            Some(page) => Some((page, ResponseSource::OfflinePage)),
            None => {
                tracing::warn!("offline page {} is not cached", self.offline_url);
                None
            }
        }
    }

    /// Fire-and-forget write; the caller never waits on it.
    fn store_in_background(&self, url: &str, response: EdgeResponse) {
        let store = self.store.clone();
        let url = url.to_string();
        tokio::spawn(async move {
            store.put_if_successful(&url, response);
        });
    }
}
