//! EventEmitter<T>: typed synchronous pub/sub.
//!
//! Listeners are stored as `Arc<dyn Fn(&T)>` so a snapshot costs only
//! ref-count bumps. Snapshot-on-emit semantics:
//!   - A listener removed *during* an emission still runs in that round.
//!   - A listener added *during* an emission first runs on the next one.
//!
//! The internal lock is never held while listeners run, so a listener may
//! call `on()`/`off()` on the same emitter. A panicking listener is isolated:
//! it is logged and the remaining listeners still run.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

/// Handle returned by [`EventEmitter::on`], accepted by [`EventEmitter::off`].
pub type ListenerId = u64;

/// Closure type for listeners.
pub type ListenerFn<T> = dyn Fn(&T) + Send + Sync;

pub struct EventEmitter<T> {
    listeners: Mutex<Vec<(ListenerId, Arc<ListenerFn<T>>)>>,
    next_id: AtomicU64,
}

impl<T> EventEmitter<T> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `callback`; it receives every subsequently emitted event.
    pub fn on(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> ListenerId {
        let callback: Arc<ListenerFn<T>> = Arc::new(callback);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, callback));
        id
    }

    /// Remove a listener. Unknown ids are ignored, so this is safe to repeat.
    pub fn off(&self, id: ListenerId) {
        self.listeners.lock().retain(|(lid, _)| *lid != id);
    }

    /// Deliver `event` to every listener registered at the time of the call.
    /// Returns how many listeners ran to completion.
    pub fn emit(&self, event: &T) -> usize {
        let snapshot: Vec<Arc<ListenerFn<T>>> = {
            let guard = self.listeners.lock();
            guard.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };

        let mut delivered = 0;
        for cb in snapshot {
            match catch_unwind(AssertUnwindSafe(|| cb(event))) {
                Ok(()) => delivered += 1,
                Err(_) => warn!("event listener panicked; continuing with remaining listeners"),
            }
        }
        delivered
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }
}

impl<T> Default for EventEmitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for EventEmitter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EventEmitter({} listeners)", self.len())
    }
}
