//! Configuration loading and resolution.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use offline_edge::{
    ImageOptions, QualityLevel, QualityTiers, DEFAULT_CACHE_NAME, DEFAULT_IMAGE_ENDPOINT,
    DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_TRANSFORM_TIMEOUT_MS,
};

use crate::types::{ProxyError, ProxyResult};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "OFFLINE_EDGE_CONFIG";

/// Proxy configuration. Every field has a default, so `{}` is a valid file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listen address (host:port).
    pub listen: String,
    /// Origin the edge sits in front of.
    pub origin: String,
    pub cache_name: String,
    /// Offline fallback page, relative to the origin or absolute.
    pub offline_url: String,
    /// Assets stored at install time, relative to the origin or absolute.
    pub precache: Vec<String>,
    /// Base URL of the image transformation endpoint.
    pub image_endpoint: String,
    pub low_quality: QualityLevel,
    pub high_quality: QualityLevel,
    pub transform_timeout_ms: u64,
    pub request_timeout_ms: u64,
    /// Refuse to start when pre-caching fails.
    pub fail_on_precache_error: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8080".to_string(),
            origin: "http://127.0.0.1:3000".to_string(),
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            offline_url: "/offline/".to_string(),
            precache: vec![
                "/assets/font/beyond_the_mountains.ttf".to_string(),
                "/assets/font/icons.woff2".to_string(),
                "/offline/".to_string(),
            ],
            image_endpoint: DEFAULT_IMAGE_ENDPOINT.to_string(),
            low_quality: QualityLevel::LOW,
            high_quality: QualityLevel::HIGH,
            transform_timeout_ms: DEFAULT_TRANSFORM_TIMEOUT_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            fail_on_precache_error: true,
        }
    }
}

impl ProxyConfig {
    /// Load from a JSON file, or defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> ProxyResult<Self> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    ProxyError::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                let config: ProxyConfig = serde_json::from_str(&raw).map_err(|e| {
                    ProxyError::Config(format!("invalid config {}: {e}", path.display()))
                })?;
                tracing::info!("Loaded config from {}", path.display());
                config
            }
            None => {
                tracing::info!("No config file found, using defaults");
                ProxyConfig::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the origin, endpoint, and timeouts.
    pub fn validate(&self) -> ProxyResult<()> {
        let origin = self.origin_url()?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(ProxyError::Config(format!(
                "origin must be http or https, got {}",
                self.origin
            )));
        }
        Url::parse(&self.image_endpoint).map_err(|e| {
            ProxyError::Config(format!("invalid image_endpoint {}: {e}", self.image_endpoint))
        })?;
        if self.transform_timeout_ms == 0 || self.request_timeout_ms == 0 {
            return Err(ProxyError::Config("timeouts must be greater than zero".into()));
        }
        Ok(())
    }

    /// The origin URL. Its path always ends with `/`.
    pub fn origin_url(&self) -> ProxyResult<Url> {
        let mut url = Url::parse(&self.origin)
            .map_err(|e| ProxyError::Config(format!("invalid origin {}: {e}", self.origin)))?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    /// Resolve a manifest entry against the origin.
    ///
    /// Entries starting with `/` live under the origin's base path; other
    /// entries are resolved as URL references.
    pub fn resolve(&self, entry: &str) -> ProxyResult<String> {
        let origin = self.origin_url()?;
        if entry.starts_with('/') {
            return Ok(origin_target(&origin, entry).to_string());
        }
        Ok(origin.join(entry)?.to_string())
    }

    pub fn offline_absolute(&self) -> ProxyResult<String> {
        self.resolve(&self.offline_url)
    }

    /// Manifest entries as absolute URLs, in order.
    pub fn precache_urls(&self) -> ProxyResult<Vec<String>> {
        self.precache.iter().map(|entry| self.resolve(entry)).collect()
    }

    pub fn image_options(&self) -> ImageOptions {
        ImageOptions {
            endpoint: self.image_endpoint.clone(),
            tiers: QualityTiers {
                low: self.low_quality,
                high: self.high_quality,
            },
            timeout: Duration::from_millis(self.transform_timeout_ms),
        }
    }
}

/// URL on the origin for a request target such as `/posts/1/?ref=home`.
///
/// The result keeps the origin's scheme, host, and port whatever the
/// target holds. The target path is placed under the origin's base path
/// with leading slashes collapsed.
pub fn origin_target(origin: &Url, target: &str) -> Url {
    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    };
    let base = origin.path().trim_end_matches('/');

    let mut url = origin.clone();
    url.set_path(&format!("{base}/{}", path.trim_start_matches('/')));
    url.set_query(query);
    url.set_fragment(None);
    url
}

/// Resolve the config file path.
///
/// Order: explicit path, `OFFLINE_EDGE_CONFIG`, `./.offline-edge/config.json`,
/// `$HOME/.offline-edge/config.json`. `None` when nothing exists.
pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(PathBuf::from(path));
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(env_path));
    }

    let cwd_config = PathBuf::from(".offline-edge/config.json");
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    let home_config = resolve_default_config_path();
    home_config.exists().then_some(home_config)
}

fn resolve_default_config_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());

    PathBuf::from(format!("{home}/.offline-edge/config.json"))
}
