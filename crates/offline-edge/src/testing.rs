//! In-process fetcher doubles for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::fetcher::Fetcher;
use crate::types::{EdgeError, EdgeResponse, EdgeResult, InterceptedRequest};

enum Script {
    Respond(EdgeResponse),
    Fail,
    /// Never settles on its own.
    Stall,
}

/// Fetcher answering from a fixed script. Unknown URLs are rejected.
#[derive(Default)]
pub(crate) struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, Script>>,
    requested: Mutex<Vec<String>>,
    calls: AtomicUsize,
    stall_dropped: Arc<AtomicBool>,
}

impl ScriptedFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, url: &str, response: EdgeResponse) {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), Script::Respond(response));
    }

    pub(crate) fn fail(&self, url: &str) {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), Script::Fail);
    }

    pub(crate) fn stall(&self, url: &str) {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), Script::Stall);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// URLs in the order they were requested.
    pub(crate) fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    /// Whether a stalled fetch was dropped before settling.
    pub(crate) fn stall_was_cancelled(&self) -> bool {
        self.stall_dropped.load(Ordering::SeqCst)
    }
}

/// Sets its flag when dropped.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &InterceptedRequest) -> EdgeResult<EdgeResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(request.url.clone());

        let scripted = {
            let scripts = self.scripts.lock().unwrap();
            match scripts.get(&request.url) {
                Some(Script::Respond(r)) => Some(Ok(r.clone())),
                Some(Script::Fail) | None => Some(Err(())),
                Some(Script::Stall) => None,
            }
        };

        match scripted {
            Some(Ok(response)) => Ok(response),
            Some(Err(())) => Err(EdgeError::Network(format!(
                "connection refused: {}",
                request.url
            ))),
            None => {
                let _flag = DropFlag(self.stall_dropped.clone());
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(EdgeError::Network("stalled".into()))
            }
        }
    }
}

/// Poll `check` for up to a second, yielding between attempts.
pub(crate) async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
