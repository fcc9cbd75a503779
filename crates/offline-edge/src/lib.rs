//! offline-edge: request interception core with a read-through asset cache,
//! offline fallback page, and adaptive image quality with bounded fallback.

pub mod classify;
pub mod fetcher;
pub mod image;
pub mod policy;
pub mod precache;
pub mod quality;
pub mod signals;
pub mod store;
pub mod types;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use classify::{classify, is_image_url, is_navigation, RequestKind};
pub use fetcher::{Fetcher, HttpFetcher, DEFAULT_REQUEST_TIMEOUT_MS};
pub use image::{AdaptiveImageFetch, ImageOptions, ImageSource, DEFAULT_TRANSFORM_TIMEOUT_MS};
pub use policy::{CachePolicy, ResponseSource};
pub use precache::{precache, PrecacheReport};
pub use quality::{transform_url, QualityLevel, QualityTiers, DEFAULT_IMAGE_ENDPOINT};
pub use signals::EnvironmentSignals;
pub use store::{CacheStorage, CacheStore, MemoryStore, DEFAULT_CACHE_NAME};
pub use types::*;
pub use worker::{EdgeWorker, ServedFrom};
