//! Per-URL serialization of prerender pipelines.
//!
//! Concurrent requests for the same canonical URL queue behind one lease, so
//! only the first renders and inserts while the rest find the committed entry.
//! Distinct URLs never contend.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Keyed lease map shared by every request handler.
#[derive(Default, Clone)]
pub struct InFlight {
    urls: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self { urls: Arc::new(DashMap::new()) }
    }

    /// Wait for exclusive use of `url`.
    pub async fn acquire(&self, url: &str) -> UrlLease {
        let lock = Arc::clone(self.urls.entry(url.to_string()).or_default().value());
        let guard = lock.lock_owned().await;
        UrlLease { url: url.to_string(), guard: Some(guard), urls: Arc::clone(&self.urls) }
    }

    /// Number of URLs currently held or awaited.
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// Exclusive hold on one URL; released on drop.
pub struct UrlLease {
    url: String,
    guard: Option<OwnedMutexGuard<()>>,
    urls: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl Drop for UrlLease {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map's own reference left means nobody holds or awaits this URL.
        self.urls.remove_if(&self.url, |_, lock| Arc::strong_count(lock) == 1);
    }
}
