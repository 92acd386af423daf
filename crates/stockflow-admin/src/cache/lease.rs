use std::sync::{Arc, Weak};

use tokio::runtime::Handle;
use tracing::trace;

use super::{QueryCache, QueryKey};

/// Marks an entry as observed for as long as the lease lives.
///
/// Dropping the last lease on a key evicts the entry once it has stayed
/// unobserved for the cache's `gc_time` (right away when that is zero). The
/// timer runs on the ambient tokio runtime; without one the entry waits for
/// [`QueryCache::collect_garbage`].
#[must_use = "the entry is only observed while the lease is held"]
#[derive(Debug)]
pub struct CacheLease {
    cache: Weak<QueryCache>,
    key: QueryKey,
}

impl CacheLease {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }
}

impl QueryCache {
    /// Register an observer of `key`.
    pub fn lease(self: &Arc<Self>, key: QueryKey) -> CacheLease {
        self.add_observer(&key);
        CacheLease {
            cache: Arc::downgrade(self),
            key,
        }
    }
}

impl Drop for CacheLease {
    fn drop(&mut self) {
        let Some(cache) = self.cache.upgrade() else {
            return;
        };
        let Some(release) = cache.remove_observer(&self.key) else {
            return;
        };
        let Ok(handle) = Handle::try_current() else {
            return;
        };

        let gc_time = cache.gc_time();
        let weak = Weak::clone(&self.cache);
        let key = self.key.clone();
        trace!(key = %key, release, "eviction scheduled");
        handle.spawn(async move {
            tokio::time::sleep(gc_time).await;
            if let Some(cache) = weak.upgrade() {
                cache.expire(&key, release);
            }
        });
    }
}
