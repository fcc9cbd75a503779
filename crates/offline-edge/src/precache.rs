//! Install-time pre-caching of the asset manifest.
//!
//! All-or-nothing: every URL is fetched first, and the store is only
//! written once every fetch came back 200.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::fetcher::Fetcher;
use crate::store::CacheStore;
use crate::types::{EdgeError, EdgeResponse, EdgeResult, InterceptedRequest};

/// Parallel fetches during pre-caching.
pub const PRECACHE_CONCURRENCY: usize = 4;

/// Summary of a completed pre-cache run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrecacheReport {
    /// URLs written to the store, in manifest order.
    pub stored: Vec<String>,
    pub bytes: usize,
}

/// Fetch every URL and store them together.
///
/// Duplicate URLs are fetched once. On failure nothing is written and the
/// error names the earliest failing URL in manifest order.
pub async fn precache(
    store: &Arc<dyn CacheStore>,
    fetcher: &Arc<dyn Fetcher>,
    urls: &[String],
) -> EdgeResult<PrecacheReport> {
    let mut unique: Vec<String> = Vec::with_capacity(urls.len());
    for url in urls {
        if !unique.contains(url) {
            unique.push(url.clone());
        }
    }

    let mut results: Vec<(usize, String, EdgeResult<EdgeResponse>)> = stream::iter(
        unique.into_iter().enumerate(),
    )
    .map(|(i, url)| {
        let fetcher = fetcher.clone();
        async move {
            let result = fetcher.fetch(&InterceptedRequest::get(url.clone())).await;
            (i, url, result)
        }
    })
    .buffer_unordered(PRECACHE_CONCURRENCY)
    .collect()
    .await;
    results.sort_by_key(|(i, _, _)| *i);

    let mut fetched: Vec<(String, EdgeResponse)> = Vec::with_capacity(results.len());
    for (_, url, result) in results {
        match result {
            Ok(response) if response.is_cacheable() => fetched.push((url, response)),
            Ok(response) => {
                return Err(EdgeError::Precache {
                    url,
                    reason: format!("status {}", response.status),
                })
            }
            Err(e) => {
                return Err(EdgeError::Precache {
                    url,
                    reason: e.to_string(),
                })
            }
        }
    }

    let mut report = PrecacheReport::default();
    for (url, response) in fetched {
        report.bytes += response.body.len();
        store.put_if_successful(&url, response);
        report.stored.push(url);
    }

    tracing::info!(
        "pre-cached {} assets ({} bytes)",
        report.stored.len(),
        report.bytes
    );
    Ok(report)
}
