//! LiveInvalidation: refetch a collection whenever its table changes
//! elsewhere (another tab, another user, a background job).
//!
//! Events are treated as "something changed" only: the payload is never
//! applied to the cache, the collection is always re-derived from the server.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::entity::Entity;
use crate::reactive::ChangeEvent;
use crate::remote::{ChangeCallback, ChangeNotifier, Subscription};
use crate::store::CollectionStore;

/// Keeps one store subscribed to its table's change feed for as long as it lives.
///
/// Dropping it releases the subscription and stops the periodic refetch. A
/// notification that was already being delivered when the listener was
/// dropped is ignored.
pub struct LiveInvalidation<E: Entity> {
    store: CollectionStore<E>,
    subscription: Option<Subscription>,
    ticker: Option<JoinHandle<()>>,
    active: Arc<AtomicBool>,
}

impl<E: Entity> LiveInvalidation<E> {
    /// Subscribe `store` to changes of `E::TABLE`.
    pub fn attach(store: CollectionStore<E>, notifier: &dyn ChangeNotifier) -> Self {
        let active = Arc::new(AtomicBool::new(true));

        let target = store.clone();
        let flag = Arc::clone(&active);
        let on_change: ChangeCallback = Arc::new(move |event: &ChangeEvent| {
            if !flag.load(Ordering::SeqCst) {
                return;
            }
            debug!(table = E::TABLE, kind = %event.kind, id = ?event.id, "change notification");
            refresh(&target);
        });
        let subscription = notifier.subscribe(E::TABLE, on_change);
        debug!(table = E::TABLE, "live invalidation attached");

        Self {
            store,
            subscription: Some(subscription),
            ticker: None,
            active,
        }
    }

    /// Also refetch every `every`, starting one interval from now.
    /// Needs a tokio runtime; without one the interval is ignored.
    pub fn with_refetch_interval(mut self, every: Duration) -> Self {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(table = E::TABLE, "no tokio runtime; periodic refetch disabled");
                return self;
            }
        };
        if let Some(previous) = self.ticker.take() {
            previous.abort();
        }

        let store = self.store.clone();
        let flag = Arc::clone(&self.active);
        self.ticker = Some(handle.spawn(async move {
            let start = tokio::time::Instant::now() + every;
            let mut ticker = tokio::time::interval_at(start, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !flag.load(Ordering::SeqCst) {
                    break;
                }
                debug!(table = E::TABLE, "periodic refetch");
                if let Err(err) = store.invalidate().await {
                    warn!(table = E::TABLE, error = %err, "periodic refetch failed");
                }
            }
        }));
        self
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn store(&self) -> &CollectionStore<E> {
        &self.store
    }
}

/// Invalidate and refetch on the ambient runtime, or only mark stale without one.
fn refresh<E: Entity>(store: &CollectionStore<E>) {
    match Handle::try_current() {
        Ok(handle) => {
            let store = store.clone();
            handle.spawn(async move {
                if let Err(err) = store.invalidate().await {
                    warn!(
                        table = E::TABLE,
                        error = %err,
                        "refetch after change notification failed"
                    );
                }
            });
        }
        Err(_) => store.mark_stale(),
    }
}

impl<E: Entity> Drop for LiveInvalidation<E> {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        drop(self.subscription.take());
        debug!(table = E::TABLE, "live invalidation detached");
    }
}

impl<E: Entity> std::fmt::Debug for LiveInvalidation<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveInvalidation")
            .field("table", &E::TABLE)
            .field("active", &self.is_active())
            .field("periodic", &self.ticker.is_some())
            .finish()
    }
}
