//! Adaptive image fetch: quality-tiered transformation with a bounded wait.
//!
//! The transformed variant is fetched on its own task and raced against a
//! timer. When the timer wins the task is aborted. Any failure of the
//! transformation (rejection, non-2xx, timeout) falls back to fetching the
//! original request, which is never subject to the timeout.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::fetcher::Fetcher;
use crate::quality::{transform_url, QualityLevel, QualityTiers, DEFAULT_IMAGE_ENDPOINT};
use crate::signals::EnvironmentSignals;
use crate::types::{EdgeError, EdgeResponse, EdgeResult, InterceptedRequest};

/// Default bound on the transformation fetch.
pub const DEFAULT_TRANSFORM_TIMEOUT_MS: u64 = 5_000;

/// Which request produced the image returned to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    Transformed(QualityLevel),
    Original,
}

/// Settings for [`AdaptiveImageFetch`].
#[derive(Debug, Clone, PartialEq)]
pub struct ImageOptions {
    /// Base URL of the transformation endpoint.
    pub endpoint: String,
    pub tiers: QualityTiers,
    pub timeout: Duration,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_IMAGE_ENDPOINT.to_string(),
            tiers: QualityTiers::default(),
            timeout: Duration::from_millis(DEFAULT_TRANSFORM_TIMEOUT_MS),
        }
    }
}

pub struct AdaptiveImageFetch {
    fetcher: Arc<dyn Fetcher>,
    options: ImageOptions,
}

impl AdaptiveImageFetch {
    pub fn new(fetcher: Arc<dyn Fetcher>, options: ImageOptions) -> Self {
        Self { fetcher, options }
    }

    pub fn options(&self) -> &ImageOptions {
        &self.options
    }

    /// The request sent to the transformation endpoint for this image.
    pub fn transform_request(
        &self,
        request: &InterceptedRequest,
        quality: QualityLevel,
    ) -> InterceptedRequest {
        let mut transformed =
            InterceptedRequest::get(transform_url(&self.options.endpoint, quality, &request.url));
        // f_auto negotiates the output format from accept.
        if let Some(accept) = request.header("accept") {
            transformed = transformed.with_header("accept", accept);
        }
        transformed
    }

    /// Fetch the image, degraded to the signals' quality tier.
    ///
    /// An `Err` is the outcome of the fallback fetch of the original.
    pub async fn fetch(
        &self,
        request: &InterceptedRequest,
        signals: &EnvironmentSignals,
    ) -> EdgeResult<EdgeResponse> {
        self.fetch_with_source(request, signals)
            .await
            .map(|(response, _)| response)
    }

    pub async fn fetch_with_source(
        &self,
        request: &InterceptedRequest,
        signals: &EnvironmentSignals,
    ) -> EdgeResult<(EdgeResponse, ImageSource)> {
        let quality = self.options.tiers.select(signals);
        let transformed = self.transform_request(request, quality);
        tracing::debug!("image {} -> {} ({signals:?})", request.url, transformed.url);

        match self.fetch_bounded(transformed).await {
            Ok(response) if response.is_ok() => {
                return Ok((response, ImageSource::Transformed(quality)));
            }
            Ok(response) => tracing::warn!(
                "transformation returned {} for {}, using original",
                response.status,
                request.url
            ),
            Err(e) => tracing::warn!("transformation failed for {}: {e}, using original", request.url),
        }

        let original = self.fetcher.fetch(request).await?;
        Ok((original, ImageSource::Original))
    }

    /// Race the transformation fetch against the timeout.
    ///
    /// The spawned fetch is aborted when the timer wins and when this
    /// future is dropped before either side settles.
    async fn fetch_bounded(&self, request: InterceptedRequest) -> EdgeResult<EdgeResponse> {
        let url = request.url.clone();
        let fetcher = self.fetcher.clone();
        let mut task = AbortOnDrop(tokio::spawn(async move { fetcher.fetch(&request).await }));

        tokio::select! {
            joined = &mut task.0 => joined
                .map_err(|e| EdgeError::Network(format!("transformation task ended: {e}")))?,
            _ = tokio::time::sleep(self.options.timeout) => {
                task.0.abort();
                Err(EdgeError::Timeout {
                    url,
                    timeout_ms: self.options.timeout.as_millis() as u64,
                })
            }
        }
    }
}

/// Aborts the task when dropped.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{eventually, ScriptedFetcher};

    const IMAGE: &str = "https://site.example/img/photo.png";
    const ENDPOINT: &str = "https://img.example/fetch";

    fn adaptive(fetcher: Arc<ScriptedFetcher>, timeout_ms: u64) -> AdaptiveImageFetch {
        AdaptiveImageFetch::new(
            fetcher,
            ImageOptions {
                endpoint: ENDPOINT.to_string(),
                tiers: QualityTiers::default(),
                timeout: Duration::from_millis(timeout_ms),
            },
        )
    }

    fn fast_device() -> EnvironmentSignals {
        EnvironmentSignals {
            save_data: false,
            effective_type: Some("4g".into()),
            device_memory: Some(4.0),
        }
    }

    fn high_url() -> String {
        format!("{ENDPOINT}/q_80,f_auto/{IMAGE}")
    }

    #[tokio::test]
    async fn test_transformed_image_returned_on_success() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.respond(&high_url(), EdgeResponse::new(200, "webp-bytes"));
        let images = adaptive(fetcher.clone(), 1_000);

        let (resp, source) = images
            .fetch_with_source(&InterceptedRequest::get(IMAGE), &fast_device())
            .await
            .unwrap();

        assert_eq!(resp.body, b"webp-bytes");
        assert_eq!(source, ImageSource::Transformed(QualityLevel::Fixed(80)));
        assert_eq!(fetcher.requested(), vec![high_url()]);
    }

    #[tokio::test]
    async fn test_save_data_uses_low_quality() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let low = format!("{ENDPOINT}/q_30,f_auto/{IMAGE}");
        fetcher.respond(&low, EdgeResponse::new(200, "tiny"));
        let images = adaptive(fetcher.clone(), 1_000);

        let signals = EnvironmentSignals {
            save_data: true,
            ..fast_device()
        };
        let resp = images
            .fetch(&InterceptedRequest::get(IMAGE), &signals)
            .await
            .unwrap();

        assert_eq!(resp.body, b"tiny");
        assert_eq!(fetcher.requested(), vec![low]);
    }

    #[tokio::test]
    async fn test_non_ok_transformation_falls_back_to_original() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.respond(&high_url(), EdgeResponse::new(404, "unknown asset"));
        fetcher.respond(IMAGE, EdgeResponse::new(200, "original"));
        let images = adaptive(fetcher.clone(), 1_000);

        let (resp, source) = images
            .fetch_with_source(&InterceptedRequest::get(IMAGE), &fast_device())
            .await
            .unwrap();

        assert_eq!(resp.body, b"original");
        assert_eq!(source, ImageSource::Original);
        assert_eq!(fetcher.requested(), vec![high_url(), IMAGE.to_string()]);
    }

    #[tokio::test]
    async fn test_rejected_transformation_falls_back_to_original() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.fail(&high_url());
        fetcher.respond(IMAGE, EdgeResponse::new(200, "original"));
        let images = adaptive(fetcher, 1_000);

        let resp = images
            .fetch(&InterceptedRequest::get(IMAGE), &fast_device())
            .await
            .unwrap();
        assert_eq!(resp.body, b"original");
    }

    #[tokio::test]
    async fn test_timeout_aborts_transformation_and_falls_back() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.stall(&high_url());
        fetcher.respond(IMAGE, EdgeResponse::new(200, "original"));
        let images = adaptive(fetcher.clone(), 50);

        let (resp, source) = images
            .fetch_with_source(&InterceptedRequest::get(IMAGE), &fast_device())
            .await
            .unwrap();

        assert_eq!(resp.body, b"original");
        assert_eq!(source, ImageSource::Original);
        assert!(eventually(|| fetcher.stall_was_cancelled()).await);
    }

    #[tokio::test]
    async fn test_dropped_caller_cancels_transformation() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.stall(&high_url());
        let images = adaptive(fetcher.clone(), 60_000);

        let request = InterceptedRequest::get(IMAGE);
        let signals = fast_device();
        let outer = tokio::time::timeout(
            Duration::from_millis(50),
            images.fetch(&request, &signals),
        )
        .await;

        assert!(outer.is_err());
        assert!(eventually(|| fetcher.stall_was_cancelled()).await);
        assert_eq!(fetcher.requested(), vec![high_url()]);
    }

    #[tokio::test]
    async fn test_original_failure_is_surfaced() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.fail(&high_url());
        fetcher.fail(IMAGE);
        let images = adaptive(fetcher, 1_000);

        let result = images
            .fetch(&InterceptedRequest::get(IMAGE), &fast_device())
            .await;
        assert!(matches!(result, Err(EdgeError::Network(_))));
    }

    #[tokio::test]
    async fn test_original_non_ok_is_returned_as_is() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.respond(&high_url(), EdgeResponse::new(502, ""));
        fetcher.respond(IMAGE, EdgeResponse::new(404, "not found"));
        let images = adaptive(fetcher, 1_000);

        let resp = images
            .fetch(&InterceptedRequest::get(IMAGE), &fast_device())
            .await
            .unwrap();
        assert_eq!(resp.status, 404);
    }

    #[test]
    fn test_transform_request_forwards_accept_only() {
        let images = adaptive(Arc::new(ScriptedFetcher::new()), 1_000);
        let request = InterceptedRequest::get(IMAGE)
            .with_header("accept", "image/avif,image/webp,*/*")
            .with_header("cookie", "session=1");

        let transformed = images.transform_request(&request, QualityLevel::Auto);
        assert_eq!(transformed.url, format!("{ENDPOINT}/q_auto,f_auto/{IMAGE}"));
        assert_eq!(transformed.header("accept"), Some("image/avif,image/webp,*/*"));
        assert_eq!(transformed.header("cookie"), None);
    }
}
