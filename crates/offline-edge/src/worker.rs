//! Per-request dispatcher tying classification, images, and the cache together.

use std::fmt;
use std::sync::Arc;

use crate::classify::{classify, RequestKind};
use crate::fetcher::Fetcher;
use crate::image::{AdaptiveImageFetch, ImageOptions, ImageSource};
use crate::policy::{CachePolicy, ResponseSource};
use crate::precache::{precache, PrecacheReport};
use crate::quality::QualityLevel;
use crate::signals::EnvironmentSignals;
use crate::store::CacheStore;
use crate::types::{EdgeResponse, EdgeResult, InterceptedRequest};

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    Cache,
    Network,
    OfflinePage,
    Transformed(QualityLevel),
    OriginalImage,
}

impl fmt::Display for ServedFrom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServedFrom::Cache => write!(f, "cache"),
            ServedFrom::Network => write!(f, "network"),
            ServedFrom::OfflinePage => write!(f, "offline"),
            ServedFrom::Transformed(q) => write!(f, "transformed; {}", q.directive()),
            ServedFrom::OriginalImage => write!(f, "original-image"),
        }
    }
}

impl From<ResponseSource> for ServedFrom {
    fn from(source: ResponseSource) -> Self {
        match source {
            ResponseSource::Cache => ServedFrom::Cache,
            ResponseSource::Network => ServedFrom::Network,
            ResponseSource::OfflinePage => ServedFrom::OfflinePage,
        }
    }
}

impl From<ImageSource> for ServedFrom {
    fn from(source: ImageSource) -> Self {
        match source {
            ImageSource::Transformed(q) => ServedFrom::Transformed(q),
            ImageSource::Original => ServedFrom::OriginalImage,
        }
    }
}

/// Answers intercepted requests.
///
/// Images go through [`AdaptiveImageFetch`] only; everything else goes
/// through [`CachePolicy`]. Both share the same store and fetcher.
pub struct EdgeWorker {
    store: Arc<dyn CacheStore>,
    fetcher: Arc<dyn Fetcher>,
    policy: CachePolicy,
    images: AdaptiveImageFetch,
}

impl EdgeWorker {
    pub fn new(
        store: Arc<dyn CacheStore>,
        fetcher: Arc<dyn Fetcher>,
        offline_url: impl Into<String>,
        image_options: ImageOptions,
    ) -> Self {
        let policy = CachePolicy::new(store.clone(), fetcher.clone(), offline_url);
        let images = AdaptiveImageFetch::new(fetcher.clone(), image_options);
        Self {
            store,
            fetcher,
            policy,
            images,
        }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn offline_url(&self) -> &str {
        self.policy.offline_url()
    }

    /// One-time install step: pre-cache the manifest and the offline page.
    pub async fn install(&self, manifest: &[String]) -> EdgeResult<PrecacheReport> {
        let mut urls = manifest.to_vec();
        let offline = self.policy.offline_url().to_string();
        if !urls.contains(&offline) {
            urls.push(offline);
        }
        precache(&self.store, &self.fetcher, &urls).await
    }

    /// Answer a request. `None` means there is no usable response.
    pub async fn handle(
        &self,
        request: &InterceptedRequest,
        signals: &EnvironmentSignals,
    ) -> Option<EdgeResponse> {
        self.handle_with_source(request, signals)
            .await
            .map(|(response, _)| response)
    }

    pub async fn handle_with_source(
        &self,
        request: &InterceptedRequest,
        signals: &EnvironmentSignals,
    ) -> Option<(EdgeResponse, ServedFrom)> {
        match classify(request) {
            RequestKind::Image => match self.images.fetch_with_source(request, signals).await {
                Ok((response, source)) => Some((response, source.into())),
                Err(e) => {
                    tracing::warn!("image {} unavailable: {e}", request.url);
                    None
                }
            },
            RequestKind::Navigation | RequestKind::Asset => self
                .policy
                .respond_with_source(request)
                .await
                .map(|(response, source)| (response, source.into())),
        }
    }
}
