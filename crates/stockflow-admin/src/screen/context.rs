use std::sync::Arc;

use tracing::info;

use super::CollectionScreen;
use crate::cache::QueryCache;
use crate::config::AdminConfig;
use crate::entity::Entity;
use crate::notify::ToastQueue;
use crate::remote::{ChangeNotifier, ListRequest, MemoryBackend, RemoteSource};
use crate::store::CollectionStore;
use crate::types::SessionProvider;

/// Composition root for the back office.
///
/// One context owns the backend, the change feed, the query cache, the session
/// and the toast queue. Every store and screen mounted from it shares them, so
/// two screens over the same table see the same cache entry.
pub struct AdminContext {
    source: Arc<dyn RemoteSource>,
    notifier: Arc<dyn ChangeNotifier>,
    cache: Arc<QueryCache>,
    session: Arc<dyn SessionProvider>,
    config: AdminConfig,
    toasts: Arc<ToastQueue>,
}

impl AdminContext {
    pub fn new(
        source: Arc<dyn RemoteSource>,
        notifier: Arc<dyn ChangeNotifier>,
        session: Arc<dyn SessionProvider>,
        config: AdminConfig,
    ) -> Self {
        info!(
            gc_secs = config.gc_time.as_secs(),
            stale_secs = config.stale_time.as_secs(),
            "admin context created"
        );
        Self {
            source,
            notifier,
            cache: Arc::new(QueryCache::new(config.gc_time)),
            session,
            toasts: Arc::new(ToastQueue::from_config(&config)),
            config,
        }
    }

    /// A context over an in-memory backend, which doubles as the change feed.
    pub fn in_memory(
        session: Arc<dyn SessionProvider>,
        config: AdminConfig,
    ) -> (Self, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new(Arc::clone(&session)));
        let ctx = Self::new(backend.clone(), backend.clone(), session, config);
        (ctx, backend)
    }

    pub fn store<E: Entity>(&self) -> CollectionStore<E> {
        CollectionStore::new(
            Arc::clone(&self.source),
            Arc::clone(&self.cache),
            Arc::clone(&self.session),
        )
        .with_stale_time(self.config.stale_time)
    }

    /// Mount a list screen over `E`'s default list request.
    pub fn screen<E: Entity>(&self) -> CollectionScreen<E> {
        self.mount(self.store())
    }

    /// Mount a list screen over a custom request, e.g. a date window.
    pub fn screen_with_request<E: Entity>(&self, request: ListRequest) -> CollectionScreen<E> {
        self.mount(self.store().with_request(request))
    }

    fn mount<E: Entity>(&self, store: CollectionStore<E>) -> CollectionScreen<E> {
        CollectionScreen::mount(
            store,
            self.notifier.as_ref(),
            &self.config,
            Arc::clone(&self.toasts),
        )
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn toasts(&self) -> &Arc<ToastQueue> {
        &self.toasts
    }

    pub fn config(&self) -> &AdminConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<dyn SessionProvider> {
        &self.session
    }
}

impl std::fmt::Debug for AdminContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminContext")
            .field("config", &self.config)
            .field("cached_queries", &self.cache.len())
            .finish()
    }
}
