//! Edge application state: the worker built from configuration.

use std::sync::Arc;

use url::Url;

use offline_edge::{CacheStorage, CacheStore, EdgeWorker, Fetcher, HttpFetcher, PrecacheReport};

use crate::config::ProxyConfig;
use crate::types::ProxyResult;

/// Everything a running edge needs, built once at start.
pub struct EdgeApp {
    config: ProxyConfig,
    origin: Url,
    worker: EdgeWorker,
}

impl EdgeApp {
    /// Build the app with a reqwest fetcher.
    pub fn from_config(config: ProxyConfig) -> ProxyResult<Self> {
        let fetcher = Arc::new(HttpFetcher::new(config.request_timeout_ms));
        Self::with_fetcher(config, fetcher)
    }

    /// Build the app around any fetcher.
    pub fn with_fetcher(config: ProxyConfig, fetcher: Arc<dyn Fetcher>) -> ProxyResult<Self> {
        config.validate()?;
        let origin = config.origin_url()?;

        let storage = CacheStorage::new();
        let store: Arc<dyn CacheStore> = storage.open(&config.cache_name);

        let worker = EdgeWorker::new(
            store,
            fetcher,
            config.offline_absolute()?,
            config.image_options(),
        );

        Ok(Self {
            config,
            origin,
            worker,
        })
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn worker(&self) -> &EdgeWorker {
        &self.worker
    }

    /// Run the install step.
    ///
    /// When `fail_on_precache_error` is off, a failure is logged and an
    /// empty report returned.
    pub async fn install(&self) -> ProxyResult<PrecacheReport> {
        let urls = self.config.precache_urls()?;
        match self.worker.install(&urls).await {
            Ok(report) => Ok(report),
            Err(e) if !self.config.fail_on_precache_error => {
                tracing::warn!("Pre-cache failed, continuing without it: {e}");
                Ok(PrecacheReport::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}
