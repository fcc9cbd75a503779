//! Resource cache: a named, in-memory key-value store of successful responses.
//!
//! Entries are keyed by absolute URL. There is no eviction; the store grows
//! with every distinct URL written to it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::types::EdgeResponse;

/// Cache name used when none is configured.
pub const DEFAULT_CACHE_NAME: &str = "blogCache-latest";

/// Store shared by the cache policy, the pre-cache step, and the worker.
pub trait CacheStore: Send + Sync {
    /// Stored response for the URL, if any.
    fn get(&self, url: &str) -> Option<EdgeResponse>;

    /// Store the response when its status is exactly 200.
    ///
    /// Returns whether the entry was written. An existing entry for the URL
    /// is overwritten.
    fn put_if_successful(&self, url: &str, response: EdgeResponse) -> bool;

    fn has(&self, url: &str) -> bool;

    fn delete(&self, url: &str) -> bool;

    /// Stored URLs, sorted.
    fn keys(&self) -> Vec<String>;

    fn len(&self) -> usize {
        self.keys().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-wide in-memory store. Concurrent writes are last-write-wins.
#[derive(Debug, Default)]
pub struct MemoryStore {
    name: String,
    entries: RwLock<HashMap<String, EdgeResponse>>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, url: &str) -> Option<EdgeResponse> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(url).cloned()
    }

    fn put_if_successful(&self, url: &str, response: EdgeResponse) -> bool {
        if !response.is_cacheable() {
            tracing::debug!("not caching {url}: status {}", response.status);
            return false;
        }
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(url.to_string(), response);
        true
    }

    fn has(&self, url: &str) -> bool {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.contains_key(url)
    }

    fn delete(&self, url: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(url).is_some()
    }

    fn keys(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }
}

/// Registry of named stores, created lazily on first `open`.
#[derive(Debug, Default)]
pub struct CacheStorage {
    stores: RwLock<HashMap<String, Arc<MemoryStore>>>,
}

impl CacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the named store, creating it when it does not exist yet.
    pub fn open(&self, name: &str) -> Arc<MemoryStore> {
        if let Some(store) = self
            .stores
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
        {
            return store.clone();
        }

        let mut stores = self.stores.write().unwrap_or_else(|e| e.into_inner());
        stores
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!("creating cache {name}");
                Arc::new(MemoryStore::new(name))
            })
            .clone()
    }

    pub fn has(&self, name: &str) -> bool {
        self.stores
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(name)
    }

    /// Drop a named store. Handles already opened keep working.
    pub fn delete(&self, name: &str) -> bool {
        self.stores
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name)
            .is_some()
    }

    /// Names of all stores, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .stores
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}
